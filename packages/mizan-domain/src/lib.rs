pub mod intent;
pub mod partition;
pub mod structured;
pub mod verdict;
