//! Direct kernel energy counter via perf_event_open(2).
//!
//! Opens a system-wide, kernel-and-hypervisor-inclusive counter for the
//! package-energy event of the dynamic `power` PMU. The counter is
//! cumulative: missed ticks lose no energy accounting, since downstream
//! consumers compute deltas between consecutive raw values.

use std::fs;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use elog_common::{AcquireError, CounterConfig, ReadError};
use tracing::debug;

use crate::CounterSource;

/// Sysfs node carrying the dynamic PMU type id of the power PMU.
const POWER_PMU_TYPE_PATH: &str = "/sys/bus/event_source/devices/power/type";

/// Sysfs node describing the package-energy event (`event=0x…`).
const ENERGY_PKG_EVENT_PATH: &str = "/sys/bus/event_source/devices/power/events/energy-pkg";

/// Direct kernel-counter variant of [`CounterSource`].
///
/// A hung read on the underlying descriptor is a known unmitigated risk:
/// reads carry no per-call timeout, only the run's total duration bounds
/// the session.
#[derive(Debug)]
pub struct DirectCounter {
    config: CounterConfig,
    fd: Option<OwnedFd>,
    label: String,
}

impl DirectCounter {
    /// Create an unopened counter for the given configuration.
    #[must_use]
    pub fn new(config: CounterConfig) -> Self {
        let label = format!("perf power/energy-pkg/ (cpu {})", config.cpu);
        Self {
            config,
            fd: None,
            label,
        }
    }

    fn resolve_pmu_type(&self) -> Result<u32, AcquireError> {
        if let Some(pmu_type) = self.config.pmu_type {
            return Ok(pmu_type);
        }
        let raw = fs::read_to_string(POWER_PMU_TYPE_PATH).map_err(|_| {
            AcquireError::Unsupported(format!("no power PMU registered ({POWER_PMU_TYPE_PATH})"))
        })?;
        raw.trim().parse().map_err(|_| {
            AcquireError::Unsupported(format!("unparsable PMU type id {:?}", raw.trim()))
        })
    }

    fn resolve_event_config(&self) -> Result<u64, AcquireError> {
        if let Some(event_config) = self.config.event_config {
            return Ok(event_config);
        }
        let raw = fs::read_to_string(ENERGY_PKG_EVENT_PATH).map_err(|_| {
            AcquireError::Unsupported(format!(
                "power PMU exposes no energy-pkg event ({ENERGY_PKG_EVENT_PATH})"
            ))
        })?;
        parse_event_spec(&raw).ok_or_else(|| {
            AcquireError::Unsupported(format!("unparsable event spec {:?}", raw.trim()))
        })
    }
}

impl CounterSource for DirectCounter {
    fn open(&mut self) -> Result<(), AcquireError> {
        if self.fd.is_some() {
            return Ok(());
        }

        let pmu_type = self.resolve_pmu_type()?;
        let event_config = self.resolve_event_config()?;

        // Zeroed attr: counter enabled, kernel and hypervisor included.
        #[allow(unsafe_code)]
        let mut attr: libc::perf_event_attr = unsafe { mem::zeroed() };
        attr.type_ = pmu_type;
        attr.size = mem::size_of::<libc::perf_event_attr>() as u32;
        attr.config = event_config;

        // System-wide (pid = -1) on one CPU of the package, no group.
        #[allow(unsafe_code)]
        let fd = unsafe {
            libc::syscall(
                libc::SYS_perf_event_open,
                std::ptr::addr_of!(attr),
                -1 as libc::pid_t,
                self.config.cpu as libc::c_int,
                -1 as libc::c_int,
                0 as libc::c_ulong,
            )
        };

        if fd < 0 {
            let err = io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::EACCES | libc::EPERM) => AcquireError::PermissionDenied(err),
                Some(libc::ENOENT | libc::ENODEV | libc::EOPNOTSUPP | libc::ENOSYS) => {
                    AcquireError::Unsupported(err.to_string())
                }
                _ => AcquireError::Io(err),
            });
        }

        debug!(pmu_type, event_config, cpu = self.config.cpu, "energy counter opened");
        #[allow(unsafe_code)]
        let owned = unsafe { OwnedFd::from_raw_fd(fd as std::os::fd::RawFd) };
        self.fd = Some(owned);
        Ok(())
    }

    fn read(&mut self) -> Result<u64, ReadError> {
        let fd = self.fd.as_ref().ok_or(ReadError::Closed)?;

        let mut buf = [0u8; 8];
        #[allow(unsafe_code)]
        let n = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(ReadError::Io(io::Error::last_os_error()));
        }
        let n = n as usize;
        if n != buf.len() {
            return Err(ReadError::ShortRead(n));
        }
        Ok(u64::from_ne_bytes(buf))
    }

    fn close(&mut self) {
        if self.fd.take().is_some() {
            debug!(cpu = self.config.cpu, "energy counter closed");
        }
    }

    fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    fn describe(&self) -> &str {
        &self.label
    }
}

/// Parse a sysfs event spec such as `event=0x02` (optionally with
/// further comma-separated terms) into the attr config value.
fn parse_event_spec(spec: &str) -> Option<u64> {
    for term in spec.trim().split(',') {
        if let Some(value) = term.trim().strip_prefix("event=") {
            return if let Some(hex) = value.strip_prefix("0x") {
                u64::from_str_radix(hex, 16).ok()
            } else {
                value.parse().ok()
            };
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_spec_hex() {
        assert_eq!(parse_event_spec("event=0x02\n"), Some(0x02));
        assert_eq!(parse_event_spec("event=0x1a"), Some(0x1a));
    }

    #[test]
    fn test_parse_event_spec_decimal_and_terms() {
        assert_eq!(parse_event_spec("event=2"), Some(2));
        assert_eq!(parse_event_spec("umask=0x00,event=0x02"), Some(0x02));
    }

    #[test]
    fn test_parse_event_spec_rejects_garbage() {
        assert_eq!(parse_event_spec(""), None);
        assert_eq!(parse_event_spec("config=0x02"), None);
        assert_eq!(parse_event_spec("event=zz"), None);
    }

    #[test]
    fn test_read_before_open_is_closed() {
        let mut counter = DirectCounter::new(CounterConfig::default());
        assert!(matches!(counter.read(), Err(ReadError::Closed)));
    }

    #[test]
    fn test_close_is_idempotent_without_open() {
        let mut counter = DirectCounter::new(CounterConfig::default());
        counter.close();
        counter.close();
        assert!(!counter.is_open());
    }

    #[test]
    fn test_explicit_overrides_skip_sysfs() {
        let counter = DirectCounter::new(CounterConfig {
            cpu: 0,
            pmu_type: Some(23),
            event_config: Some(0x02),
        });
        assert_eq!(counter.resolve_pmu_type().unwrap(), 23);
        assert_eq!(counter.resolve_event_config().unwrap(), 0x02);
    }
}
