//! Address-Space Guard
//!
//! Caps the driver's own virtual address space to a fraction of system
//! memory so a runaway benchmark cannot take the host down. Children inherit
//! the limit at spawn.
//!
//! Application is best-effort: if the OS rejects the new limit the guard
//! reports `LimitOutcome::Rejected` and the run continues.

use thiserror::Error;
use tracing::debug;

/// Default share of total memory the driver may map
pub const DEFAULT_MEMORY_FRACTION: f64 = 0.7;

/// Errors from the address-space guard
#[derive(Debug, Error)]
pub enum LimitError {
    #[error("System memory information is unavailable")]
    MemoryInfoUnavailable,

    #[error("Memory fraction must be in (0, 1], got {0}")]
    InvalidFraction(f64),

    #[error("Failed to query address-space limit: {0}")]
    Query(std::io::Error),
}

/// Total and available physical memory in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    /// Total physical memory
    pub total: u64,
    /// Memory available for new allocations
    pub available: u64,
}

/// Read system memory information (Linux only)
pub fn memory_info() -> Option<MemoryInfo> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|content| parse_meminfo(&content))
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Parse a `/proc/meminfo` body. `MemFree` stands in for `MemAvailable` on old kernels.
pub fn parse_meminfo(content: &str) -> Option<MemoryInfo> {
    let field = |name: &str| {
        content
            .lines()
            .find(|l| l.starts_with(name) && l[name.len()..].starts_with(':'))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|s| s.parse::<u64>().ok())
            .map(|kb| kb.saturating_mul(1024))
    };

    let total = field("MemTotal")?;
    let available = field("MemAvailable").or_else(|| field("MemFree"))?;
    Some(MemoryInfo { total, available })
}

/// Soft and hard `RLIMIT_AS` values; `None` means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpaceLimit {
    /// Current (soft) limit
    pub soft: Option<u64>,
    /// Ceiling the soft limit may not exceed
    pub hard: Option<u64>,
}

/// Result of applying the guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitOutcome {
    /// Soft limit set to `limit` bytes
    Applied { limit: u64 },
    /// The OS refused the new limit; nothing changed
    Rejected { requested: u64, reason: String },
    /// No address-space limits on this platform
    Unsupported,
}

/// Compute the soft limit to request.
///
/// Never exceeds an existing finite soft or hard limit.
pub fn plan_limit(requested: u64, current: AddressSpaceLimit) -> u64 {
    let mut limit = requested;
    if let Some(soft) = current.soft.filter(|&s| s > 0) {
        limit = limit.min(soft);
    }
    if let Some(hard) = current.hard {
        limit = limit.min(hard);
    }
    limit
}

/// Limit in bytes for `fraction` of total memory
pub fn fraction_of_total(info: MemoryInfo, fraction: f64) -> Result<u64, LimitError> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(LimitError::InvalidFraction(fraction));
    }
    Ok((info.total as f64 * fraction) as u64)
}

/// Current `RLIMIT_AS` of this process
#[cfg(unix)]
pub fn current_limit() -> Result<Option<AddressSpaceLimit>, LimitError> {
    // SAFETY: rlimit is plain old data.
    let mut rlim: libc::rlimit = unsafe { std::mem::zeroed() };
    // SAFETY: rlim is a valid out-pointer.
    let ret = unsafe { libc::getrlimit(libc::RLIMIT_AS, &mut rlim) };
    if ret != 0 {
        return Err(LimitError::Query(std::io::Error::last_os_error()));
    }
    let finite = |v: libc::rlim_t| (v != libc::RLIM_INFINITY).then_some(v as u64);
    Ok(Some(AddressSpaceLimit {
        soft: finite(rlim.rlim_cur),
        hard: finite(rlim.rlim_max),
    }))
}

/// Address-space limits do not exist on this platform
#[cfg(not(unix))]
pub fn current_limit() -> Result<Option<AddressSpaceLimit>, LimitError> {
    Ok(None)
}

/// Cap this process's address space.
///
/// `max_memory` defaults to `fraction` of total system memory. The hard
/// limit is left unchanged.
pub fn apply_memory_limit(
    max_memory: Option<u64>,
    fraction: f64,
) -> Result<LimitOutcome, LimitError> {
    let Some(current) = current_limit()? else {
        return Ok(LimitOutcome::Unsupported);
    };

    let requested = match max_memory {
        Some(bytes) => bytes,
        None => fraction_of_total(memory_info().ok_or(LimitError::MemoryInfoUnavailable)?, fraction)?,
    };
    let limit = plan_limit(requested, current);
    debug!(requested, limit, ?current, "applying address-space limit");

    set_soft_limit(limit, current)
}

#[cfg(unix)]
fn set_soft_limit(limit: u64, current: AddressSpaceLimit) -> Result<LimitOutcome, LimitError> {
    let rlim = libc::rlimit {
        rlim_cur: limit as libc::rlim_t,
        rlim_max: current.hard.map_or(libc::RLIM_INFINITY, |h| h as libc::rlim_t),
    };
    // SAFETY: rlim is a fully initialised value.
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_AS, &rlim) };
    if ret == 0 {
        return Ok(LimitOutcome::Applied { limit });
    }

    // e.g. macOS refuses limits below the current usage
    let err = std::io::Error::last_os_error();
    debug!(limit, error = %err, "address-space limit rejected");
    Ok(LimitOutcome::Rejected {
        requested: limit,
        reason: err.to_string(),
    })
}

#[cfg(not(unix))]
fn set_soft_limit(_limit: u64, _current: AddressSpaceLimit) -> Result<LimitOutcome, LimitError> {
    Ok(LimitOutcome::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16314384 kB\nMemFree:         1000000 kB\nMemAvailable:    8000000 kB\n";

    #[test]
    fn test_parse_meminfo() {
        let info = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(info.total, 16_314_384 * 1024);
        assert_eq!(info.available, 8_000_000 * 1024);
    }

    #[test]
    fn test_parse_meminfo_without_available() {
        let info = parse_meminfo("MemTotal: 2048 kB\nMemFree: 1024 kB\n").unwrap();
        assert_eq!(info.available, 1024 * 1024);
        assert!(parse_meminfo("MemFree: 1 kB\n").is_none());
    }

    #[test]
    fn test_plan_limit_respects_existing_limits() {
        let unlimited = AddressSpaceLimit { soft: None, hard: None };
        assert_eq!(plan_limit(1000, unlimited), 1000);

        let soft = AddressSpaceLimit { soft: Some(500), hard: None };
        assert_eq!(plan_limit(1000, soft), 500);

        let hard = AddressSpaceLimit { soft: None, hard: Some(300) };
        assert_eq!(plan_limit(1000, hard), 300);

        // A zero soft limit is ignored, the hard ceiling is not
        let zero = AddressSpaceLimit { soft: Some(0), hard: Some(800) };
        assert_eq!(plan_limit(1000, zero), 800);
    }

    #[test]
    fn test_fraction_of_total() {
        let info = MemoryInfo { total: 1000, available: 10 };
        assert_eq!(fraction_of_total(info, DEFAULT_MEMORY_FRACTION).unwrap(), 700);
        assert!(matches!(fraction_of_total(info, 0.0), Err(LimitError::InvalidFraction(_))));
        assert!(matches!(fraction_of_total(info, 1.5), Err(LimitError::InvalidFraction(_))));
        assert!(matches!(fraction_of_total(info, f64::NAN), Err(LimitError::InvalidFraction(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_memory_info_linux() {
        let info = memory_info().unwrap();
        assert!(info.total > 0);
        assert!(info.available <= info.total);
    }

    #[cfg(unix)]
    #[test]
    fn test_apply_twice_is_idempotent() {
        // Requesting "unlimited" clamps to whatever is already in place
        let before = current_limit().unwrap().unwrap();
        let first = apply_memory_limit(Some(u64::MAX), DEFAULT_MEMORY_FRACTION).unwrap();
        let second = apply_memory_limit(Some(u64::MAX), DEFAULT_MEMORY_FRACTION).unwrap();
        assert_eq!(first, second);

        let after = current_limit().unwrap().unwrap();
        assert_eq!(after.hard, before.hard);
        if let (Some(hard), Some(soft)) = (after.hard, after.soft) {
            assert!(soft <= hard);
        }
    }
}
