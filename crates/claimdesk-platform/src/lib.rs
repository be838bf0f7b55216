pub mod config;
pub mod contracts;
pub mod db;
pub mod pg_store;
pub mod receipts;

pub use config::ServiceConfig;
pub use contracts::{
    ApprovedReportQuery, ApprovedTotalsQuery, ClaimView, DecideClaimRequest, EditClaimRequest,
    ListClaimsQuery, ListClaimsResponse, MonthlyBreakdownQuery, MonthlyBreakdownResponse,
    OpenAccountsRequest, ReceiptView, SetCreditAccountRequest, SubmitClaimResponse,
};
pub use db::{connect_database, ping, run_migrations};
pub use pg_store::{PgClaimStore, PgClaimTx};
pub use receipts::DiskReceiptStorage;
