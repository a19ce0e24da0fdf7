pub mod address;
pub mod consumption;

pub use address::Address;
pub use consumption::ConsumptionRecord;
