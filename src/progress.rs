use log::info;
use std::sync::{Arc, Mutex};

pub type ProgressCallback = Arc<Mutex<dyn FnMut(usize, usize) + Send>>;

/// Progress callback that logs every 5% step and once on completion.
pub fn logging_progress(activity: &'static str, unit_label: &'static str) -> ProgressCallback {
    let mut last_percent: Option<usize> = None;
    Arc::new(Mutex::new(move |completed: usize, total: usize| {
        let percent = percent_done(completed, total);

        let should_log = match last_percent {
            Some(prev) => percent >= prev.saturating_add(5) || (percent == 100 && percent != prev),
            None => true,
        };

        if should_log {
            info!(
                "{} progress: {}% ({} / {} {})",
                activity,
                percent,
                completed.min(total),
                total,
                unit_label
            );
            last_percent = Some(percent);
        }
    }))
}

pub fn report(progress: Option<&ProgressCallback>, completed: usize, total: usize) {
    if let Some(callback) = progress {
        if let Ok(mut cb) = callback.lock() {
            cb(completed.min(total), total);
        }
    }
}

fn percent_done(completed: usize, total: usize) -> usize {
    if total == 0 {
        return 100;
    }
    ((completed.min(total) as f64 / total as f64) * 100.0)
        .round()
        .clamp(0.0, 100.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent_done(0, 0), 100);
        assert_eq!(percent_done(1, 4), 25);
        assert_eq!(percent_done(9, 4), 100);
    }

    #[test]
    fn report_forwards_to_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(Mutex::new(move |done: usize, total: usize| {
            sink.lock().unwrap().push((done, total));
        }));
        report(Some(&callback), 3, 10);
        report(Some(&callback), 12, 10);
        report(None, 1, 1);
        assert_eq!(*seen.lock().unwrap(), vec![(3, 10), (10, 10)]);
    }
}
