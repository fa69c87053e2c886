mod document_case;
mod query_case;
mod recovery_case;
