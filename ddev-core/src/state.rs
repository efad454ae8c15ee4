use std::fmt;

/// Health of one container, as reported by the engine.
///
/// When the image defines a health check the engine appends it to the status
/// string (`Up 3 seconds (healthy)`); otherwise only the state is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerHealth {
    Healthy,
    Starting,
    Unhealthy,
    Running,
    Exited,
    Restarting,
    Paused,
    Created,
    Unknown,
}

impl ContainerHealth {
    pub fn parse(state: &str, status: &str) -> Self {
        if status.contains("(healthy)") {
            return Self::Healthy;
        }
        if status.contains("(health: starting)") {
            return Self::Starting;
        }
        if status.contains("(unhealthy)") {
            return Self::Unhealthy;
        }
        match state {
            "running" => Self::Running,
            "exited" | "dead" => Self::Exited,
            "restarting" => Self::Restarting,
            "paused" => Self::Paused,
            "created" => Self::Created,
            _ => Self::Unknown,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Starting => "starting",
            Self::Unhealthy => "unhealthy",
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Restarting => "restarting",
            Self::Paused => "paused",
            Self::Created => "created",
            Self::Unknown => "",
        }
    }

    const fn is_stopped(self) -> bool {
        matches!(self, Self::Exited | Self::Created)
    }
}

impl fmt::Display for ContainerHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summarized status of a project, derived from its web and db containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteStatus {
    NotFound,
    Stopped,
    Starting,
    Running,
    /// Mixed health; carries `service:health` for each service that is not healthy.
    Degraded(String),
}

impl SiteStatus {
    /// `None` means the service has no container.
    pub fn derive(web: Option<ContainerHealth>, db: Option<ContainerHealth>) -> Self {
        use ContainerHealth::{Healthy, Starting};

        match (web, db) {
            (None, None) => Self::NotFound,
            (Some(Healthy), Some(Healthy)) => Self::Running,
            (Some(w), Some(d)) if w.is_stopped() && d.is_stopped() => Self::Stopped,
            (Some(Healthy | Starting), Some(Healthy | Starting)) => Self::Starting,
            _ => {
                let detail = [("web", web), ("db", db)]
                    .into_iter()
                    .filter(|(_, health)| *health != Some(Healthy))
                    .map(|(service, health)| {
                        format!("{service}:{}", health.map_or("missing", ContainerHealth::as_str))
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                Self::Degraded(detail)
            }
        }
    }

    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("not found"),
            Self::Stopped => f.write_str("stopped"),
            Self::Starting => f.write_str("starting"),
            Self::Running => f.write_str("running"),
            Self::Degraded(detail) => write!(f, "degraded ({detail})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ContainerHealth::*;
    use super::*;

    #[test]
    fn health_from_status_string() {
        assert_eq!(ContainerHealth::parse("running", "Up 2 minutes (healthy)"), Healthy);
        assert_eq!(
            ContainerHealth::parse("running", "Up 1 second (health: starting)"),
            Starting
        );
        assert_eq!(ContainerHealth::parse("running", "Up 5 minutes (unhealthy)"), Unhealthy);
        assert_eq!(ContainerHealth::parse("running", "Up 5 minutes"), Running);
        assert_eq!(ContainerHealth::parse("exited", "Exited (0) 3 hours ago"), Exited);
        assert_eq!(ContainerHealth::parse("weird", ""), Unknown);
        assert_eq!(Unknown.as_str(), "");
    }

    #[test]
    fn site_status_table() {
        assert_eq!(SiteStatus::derive(None, None), SiteStatus::NotFound);
        assert_eq!(SiteStatus::derive(Some(Healthy), Some(Healthy)), SiteStatus::Running);
        assert_eq!(SiteStatus::derive(Some(Exited), Some(Exited)), SiteStatus::Stopped);
        assert_eq!(SiteStatus::derive(Some(Starting), Some(Healthy)), SiteStatus::Starting);
        assert_eq!(
            SiteStatus::derive(Some(Healthy), Some(Unhealthy)),
            SiteStatus::Degraded("db:unhealthy".into())
        );
        assert_eq!(
            SiteStatus::derive(Some(Exited), None).to_string(),
            "degraded (web:exited db:missing)"
        );
    }
}
