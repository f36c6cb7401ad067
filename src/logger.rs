//! Convenience producer filling in the per process header fields.

use chrono::Utc;

use crate::emitter::Emitter;
use crate::message::{check_field, Body, EntryBuilder, MAX_APPNAME_LEN, MAX_HOSTNAME_LEN};
use crate::structured_data::StructuredData;
use crate::{Error, Priority, Severity};

/// Stamps every entry with hostname, app name, pid and the current time,
/// then hands it to an [`Emitter`].
#[derive(Debug)]
pub struct Logger<E> {
    emitter: E,
    priority: Priority,
    hostname: Option<String>,
    appname: Option<String>,
    procid: String,
}

fn valid(field: &'static str, value: String, max: usize) -> Option<String> {
    match check_field(field, &value, max) {
        Ok(()) => Some(value),
        Err(err) => {
            tracing::debug!(error = %err, "leaving header field empty");
            None
        }
    }
}

fn local_hostname() -> Option<String> {
    let name = hostname::get().ok()?.into_string().ok()?;
    valid("hostname", name, MAX_HOSTNAME_LEN)
}

fn executable_name() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    let stem = exe.file_stem()?.to_str()?.to_owned();
    valid("app-name", stem, MAX_APPNAME_LEN)
}

impl<E: Emitter> Logger<E> {
    pub fn new(emitter: E) -> Self {
        Self {
            emitter,
            priority: Priority::DEFAULT,
            hostname: local_hostname(),
            appname: executable_name(),
            procid: std::process::id().to_string(),
        }
    }

    /// Priority used by [`Logger::log`].
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_appname(mut self, appname: impl Into<String>) -> Self {
        self.appname = Some(appname.into());
        self
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn appname(&self) -> Option<&str> {
        self.appname.as_deref()
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// A builder with every per process field filled in.
    pub fn entry(&self, priority: Priority) -> EntryBuilder {
        let mut builder = EntryBuilder::new(priority)
            .timestamp(Utc::now())
            .procid(self.procid.clone());

        if let Some(hostname) = &self.hostname {
            builder = builder.hostname(hostname.clone());
        }
        if let Some(appname) = &self.appname {
            builder = builder.appname(appname.clone());
        }

        builder
    }

    /// Log a message at the default priority.
    pub fn log(&mut self, msg: impl Into<Body>) -> Result<(), Error> {
        let builder = self.entry(self.priority).body(msg);
        self.send(builder)
    }

    /// Log at another severity, keeping the configured facility.
    pub fn log_at(&mut self, severity: Severity, msg: impl Into<Body>) -> Result<(), Error> {
        let priority = Priority::new(self.priority.facility(), severity);
        let builder = self.entry(priority).body(msg);
        self.send(builder)
    }

    pub fn log_structured(
        &mut self,
        msgid: Option<&str>,
        structured_data: StructuredData,
        msg: impl Into<Body>,
    ) -> Result<(), Error> {
        let mut builder = self
            .entry(self.priority)
            .structured_data(structured_data)
            .body(msg);
        if let Some(msgid) = msgid {
            builder = builder.msgid(msgid);
        }
        self.send(builder)
    }

    pub fn send(&mut self, builder: EntryBuilder) -> Result<(), Error> {
        let entry = builder.build()?;
        self.emitter.emit(&entry)
    }

    pub fn close(&mut self) -> Result<(), Error> {
        self.emitter.close()
    }
}
