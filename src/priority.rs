use std::fmt;

use crate::{Error, Facility, Severity};

/// Largest PRIVAL allowed by RFC 5424, `LOCAL7 << 3 | DEBUG`.
pub const MAX_PRIVAL: u8 = 191;

/// The `<PRIVAL>` of a message: facility and severity packed as
/// `facility * 8 + severity`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Priority {
    facility: Facility,
    severity: Severity,
}

impl Priority {
    /// `user.info`, used when a producer does not pick a priority.
    pub const DEFAULT: Priority = Priority::new(Facility::USER, Severity::INFO);

    pub const fn new(facility: Facility, severity: Severity) -> Self {
        Self { facility, severity }
    }

    pub fn facility(&self) -> Facility {
        self.facility
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// The packed numeric value written between the angle brackets.
    pub fn prival(&self) -> u8 {
        (self.facility.code() << 3) | self.severity.code()
    }
}

impl TryFrom<u8> for Priority {
    type Error = Error;

    fn try_from(prival: u8) -> Result<Self, Self::Error> {
        if prival > MAX_PRIVAL {
            return Err(Error::BadPriority(prival as u16));
        }

        let severity = Severity::try_from(prival & 0x7)?;
        let facility = Facility::try_from(prival >> 3)?;

        Ok(Self { facility, severity })
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.facility.as_str(), self.severity.as_str())
    }
}
