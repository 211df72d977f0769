mod engine;
mod error;
mod random;
mod summary;
mod types;

pub use engine::{run, run_parallel, run_seeded, run_unseeded};
pub use error::SimulationError;
pub use random::{NormalReturns, ReturnSource};
pub use summary::{CSV_FILE_NAME, DEFAULT_HISTOGRAM_BINS, csv_string, histogram, write_csv};
pub use types::{HistogramBin, SimulationParameters, SimulationReport, TrialOutcome};
