//! Human and JSON renderings of command results.

use anyhow::Result;
use chatgraph_loader::LoadReport;
use chatgraph_queries::{DeletedStatus, MessageSummary, StatusSummary, UsersOverview};
use colored::Colorize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }

    pub fn report(&self, report: &LoadReport) -> Result<()> {
        self.emit(report, || {
            for phase in &report.phases {
                println!(
                    "  {} {:<20} entities={:<4} edges={}",
                    "✓".green(),
                    phase.name,
                    phase.entities,
                    phase.edges
                );
            }
            println!(
                "{} {} entities, {} edges",
                "created".green().bold(),
                report.entities(),
                report.edges()
            );
        })
    }

    pub fn groups(&self, user: &str, groups: &[String]) -> Result<()> {
        self.emit(&groups, || {
            println!("Groups of {} ({}):", user.cyan().bold(), groups.len());
            for group in groups {
                println!("  - {group}");
            }
        })
    }

    pub fn messages(&self, messages: &[MessageSummary]) -> Result<()> {
        self.emit(&messages, || {
            println!("{} message(s)", messages.len());
            for m in messages {
                let at = m.send_at.as_deref().unwrap_or("?");
                println!("  [{}] {}", at.dimmed(), m.content);
                if !m.reactions.is_empty() {
                    println!("        {}", m.reactions.join(" "));
                }
            }
        })
    }

    pub fn statuses(&self, statuses: &[StatusSummary]) -> Result<()> {
        self.emit(&statuses, || {
            println!("{} status(es)", statuses.len());
            for s in statuses {
                let at = s.posted_at.as_deref().unwrap_or("?");
                let by = if s.posted_by.is_empty() {
                    "unknown".to_string()
                } else {
                    s.posted_by.join(", ")
                };
                println!("  [{}] {} ({}): {}", at.dimmed(), s.content.bold(), by, s.text);
            }
        })
    }

    pub fn users(&self, overview: &UsersOverview) -> Result<()> {
        self.emit(overview, || {
            println!("Number of users: {}", overview.total.to_string().bold());
            for u in &overview.users {
                let phone = u.phone.map(|p| p.to_string()).unwrap_or_default();
                let location = u
                    .location
                    .as_ref()
                    .and_then(|l| l.get("coordinates"))
                    .map(|c| c.to_string())
                    .unwrap_or_default();
                println!("  {:<16} {:<12} {}", u.name, phone, location.dimmed());
            }
        })
    }

    pub fn deleted(&self, deleted: &[DeletedStatus]) -> Result<()> {
        self.emit(&deleted, || {
            for d in deleted {
                let at = d.posted_at.as_deref().unwrap_or("?");
                println!("  {} {} [{}] {}", "deleted".red(), d.uid, at.dimmed(), d.content);
            }
            println!("{} status(es) deleted", deleted.len());
        })
    }

    pub fn done(&self, message: &str) -> Result<()> {
        self.emit(&serde_json::json!({ "ok": true, "message": message }), || {
            println!("{} {message}", "ok:".green().bold());
        })
    }
}
