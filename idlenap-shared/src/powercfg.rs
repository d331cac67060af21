//! Reading `powercfg /a` output.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
    Unknown,
}

impl Availability {
    pub fn reason(&self) -> &'static str {
        match self {
            Availability::Available => "Hibernate is available on this system.",
            Availability::Unavailable => "Hibernate is not available on this system.",
            Availability::Unknown => "Could not determine hibernate state from powercfg output.",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Available,
    NotAvailable,
}

/// Decides whether hibernate is listed as available. Hybrid sleep lines do not
/// count as hibernate.
pub fn hibernate_availability(output: &str) -> Availability {
    let mut section = None;
    let mut in_available = false;
    let mut in_not_available = false;

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let lower = line.to_lowercase();
        if lower.contains("the following sleep states are available")
            || line.contains("此系统上有以下睡眠状态")
        {
            section = Some(Section::Available);
            continue;
        }
        if lower.contains("the following sleep states are not available")
            || line.contains("此系统上没有以下睡眠状态")
        {
            section = Some(Section::NotAvailable);
            continue;
        }

        let hybrid = lower.contains("hybrid sleep") || line.contains("混合睡眠");
        let hibernate = !hybrid && (lower.contains("hibernate") || line.contains("休眠"));
        if !hibernate {
            continue;
        }
        match section {
            Some(Section::Available) => in_available = true,
            Some(Section::NotAvailable) => in_not_available = true,
            None => {}
        }
    }

    if in_available {
        Availability::Available
    } else if in_not_available {
        Availability::Unavailable
    } else {
        Availability::Unknown
    }
}
