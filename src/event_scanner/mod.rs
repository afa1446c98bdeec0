mod filter;
mod record;
mod results;
mod scanner;

pub use filter::EventFilter;
pub use record::{EventRecord, decode_log, render_args};
pub use results::SharedResults;
pub use scanner::{
    DEFAULT_BATCH_SPAN, DEFAULT_MAX_CONCURRENT_DECODES, DEFAULT_POLL_INTERVAL, EventScanner,
    EventScannerBuilder, Historic, Live, PollerState, ScanRange, TailMode, Unspecified,
    scan_historical, scan_live,
};
