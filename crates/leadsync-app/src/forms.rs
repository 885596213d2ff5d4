// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::Serialize;

use crate::{ActionDate, Task};

/// Add-lead form contents, serialized as the create request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLead {
    pub im: String,
    pub company_name: String,
    pub agent_name: String,
    pub email: String,
    pub task: Task,
    pub date: String,
}

impl NewLead {
    pub fn blank() -> Self {
        Self {
            im: String::new(),
            company_name: String::new(),
            agent_name: String::new(),
            email: String::new(),
            task: Task::Contact,
            date: String::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("im", &self.im),
            ("company name", &self.company_name),
            ("agent name", &self.agent_name),
            ("email", &self.email),
            ("date", &self.date),
        ];
        if let Some((label, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            bail!("{label} is required -- fill out all fields and retry");
        }
        if ActionDate::parse_day(&self.date).is_none() {
            bail!(
                "date {:?} is not a date -- use YYYY-MM-DD",
                self.date
            );
        }
        Ok(())
    }
}
