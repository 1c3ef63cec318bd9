/// Reporting granularity for upload progress.
const REPORT_STEP: u8 = 5;

/// Percentage of `declared` covered by `received`, floored and capped at 100.
///
/// A zero declared size always yields 0: the size is advisory and only
/// drives progress reporting.
pub fn percent_of(received: u64, declared: u64) -> u8 {
    if declared == 0 {
        return 0;
    }
    let pct = (u128::from(received) * 100) / u128::from(declared);
    pct.min(100) as u8
}

/// Returns `true` when `current` should be surfaced to the device.
///
/// Progress is reported only when it moved since the last report and
/// landed on a 5% boundary or reached 100%.
pub fn should_report(current: u8, last_reported: u8) -> bool {
    current != last_reported && (current % REPORT_STEP == 0 || current == 100)
}
