//! In-process operational metrics, exposed in Prometheus text format at
//! `/metrics`.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use once_cell::sync::Lazy;

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// The fixed set of counters this service reports.
#[derive(Debug, Default)]
pub struct Registry {
    pub overrides_set_total: Counter,
    pub overrides_cleared_total: Counter,
    pub distributions_created_total: Counter,
    pub sales_recorded_total: Counter,
    pub sales_rejected_total: Counter,
    pub snapshots_published_total: Counter,
    pub realtime_connections: Gauge,
}

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::default);

/// Renders every metric in Prometheus text exposition format.
pub fn render() -> String {
    let r = &*REGISTRY;
    let mut out = String::new();
    for (name, value) in [
        ("overrides_set_total", r.overrides_set_total.get()),
        ("overrides_cleared_total", r.overrides_cleared_total.get()),
        (
            "distributions_created_total",
            r.distributions_created_total.get(),
        ),
        ("sales_recorded_total", r.sales_recorded_total.get()),
        ("sales_rejected_total", r.sales_rejected_total.get()),
        (
            "snapshots_published_total",
            r.snapshots_published_total.get(),
        ),
    ] {
        out.push_str(&format!("# TYPE {} counter\n{} {}\n", name, name, value));
    }
    out.push_str(&format!(
        "# TYPE realtime_connections gauge\nrealtime_connections {}\n",
        r.realtime_connections.get()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_render() {
        let registry = Registry::default();
        registry.sales_recorded_total.inc();
        registry.sales_recorded_total.inc_by(4);
        assert_eq!(registry.sales_recorded_total.get(), 5);

        registry.realtime_connections.inc();
        registry.realtime_connections.dec();
        assert_eq!(registry.realtime_connections.get(), 0);

        let text = render();
        assert!(text.contains("# TYPE sales_recorded_total counter"));
        assert!(text.contains("# TYPE realtime_connections gauge"));
    }
}
