use crate::profile::ProfileRegistry;
use crate::structs::DecodedPacket;

use indicatif::{HumanBytes, ProgressBar, ProgressState, ProgressStyle};
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Profile a packet source while showing a spinner on stderr.
/// Nothing is drawn when stderr is not a terminal.
pub fn profile_with_progress(packets: impl Iterator<Item = DecodedPacket>) -> ProfileRegistry {
    let bytes = Arc::new(AtomicU64::new(0));
    let pb = ProgressBar::new_spinner();
    {
        let bytes = Arc::clone(&bytes);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} Profiling [{pos} packets, {volume}] ({elapsed})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .with_key("volume", move |_: &ProgressState, w: &mut dyn Write| {
                let _ = write!(w, "{}", HumanBytes(bytes.load(Ordering::Relaxed)));
            }),
        );
    }
    pb.enable_steady_tick(Duration::from_millis(100));

    let registry = ProfileRegistry::from_packets(packets.inspect(|p| {
        pb.inc(1);
        bytes.fetch_add(p.captured_len as u64, Ordering::Relaxed);
    }));
    pb.finish_and_clear();
    registry
}
