pub mod invoice;
pub mod outcome;
pub mod po;
pub mod receipt;

pub use invoice::{DuplicateKey, InvoiceLine};
pub use outcome::{AppliedTolerances, InvoiceDisposition, LineMatch, MatchOutcome};
pub use po::{LineKey, PurchaseOrderLine};
pub use receipt::GoodsReceiptLine;
