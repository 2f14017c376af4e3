pub mod company_lookup_client;
pub mod json_output_adapter;

pub use company_lookup_client::HttpCompanyLookup;
pub use json_output_adapter::JsonOutputAdapter;
