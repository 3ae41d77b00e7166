pub mod balance;
pub mod custody;
pub mod sweep;

pub use balance::{BalanceOracle, BalanceReading, ReadingStatus};
pub use custody::{CustodyService, DepositKey};
pub use sweep::{SweepOutcome, SweepPipeline, SweepReport, SweepState};
