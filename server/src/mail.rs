// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Outbound mail. Requests and the sweep only ever queue mail; a single
//! worker drains the queue so delivery never blocks or fails a request.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use handlebars::Handlebars;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use parking_lot::Mutex;
use serde_json::json;
use taskdesk_common::{Staff, Task};
use tokio::sync::{OnceCell, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SmtpSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Delivers through an SMTP relay. The transport is built on first use and
/// reused for the life of the mailer.
pub struct SmtpMailer {
    settings: SmtpSettings,
    transport: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Self {
        Self {
            settings,
            transport: OnceCell::new(),
        }
    }

    async fn transport(&self) -> Result<&AsyncSmtpTransport<Tokio1Executor>> {
        self.transport
            .get_or_try_init(|| async {
                info!("Opening SMTP transport to {}:{}", self.settings.host, self.settings.port);
                build_transport(&self.settings)
            })
            .await
    }
}

fn build_transport(settings: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    // Port 465 speaks TLS from the first byte; everything else upgrades with STARTTLS.
    let builder = if settings.port == 465 {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
    }
    .with_context(|| format!("Invalid SMTP relay {}", settings.host))?
    .port(settings.port);

    let builder = match (&settings.username, &settings.password) {
        (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
        _ => builder,
    };

    Ok(builder.build())
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let from: Mailbox = self
            .settings
            .from_address()
            .parse()
            .context("Invalid sender address")?;
        let to: Mailbox = mail
            .to
            .parse()
            .with_context(|| format!("Invalid recipient address {}", mail.to))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(mail.html.clone())
            .context("Failed to build message")?;

        self.transport().await?.send(message).await.context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Used when no SMTP relay is configured: logs the mail instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        info!("SMTP not configured; not sending '{}' to {}", mail.subject, mail.to);
        Ok(())
    }
}

/// Keeps every mail in memory. Recipients listed in `reject` fail delivery.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    reject: Vec<String>,
}

impl MemoryMailer {
    pub fn rejecting(recipients: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        if self.reject.contains(&mail.to) {
            return Err(anyhow!("mailbox {} unavailable", mail.to));
        }
        self.sent.lock().push(mail.clone());
        Ok(())
    }
}

/// Sending half of the mail queue. Cheap to clone; the worker stops once
/// every clone is dropped and the queue is empty.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<OutgoingMail>,
}

impl Outbox {
    pub fn start(mailer: Arc<dyn Mailer>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(drain(rx, mailer));
        (Self { tx }, worker)
    }

    pub fn enqueue(&self, mail: OutgoingMail) {
        debug!("Queueing '{}' for {}", mail.subject, mail.to);
        if let Err(e) = self.tx.send(mail) {
            warn!("Mail worker is gone, dropping '{}' for {}", e.0.subject, e.0.to);
        }
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<OutgoingMail>, mailer: Arc<dyn Mailer>) {
    let mut delivered = 0usize;
    let mut failed = 0usize;
    while let Some(mail) = rx.recv().await {
        match mailer.send(&mail).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                failed += 1;
                warn!("Email '{}' to {} failed: {:#}", mail.subject, mail.to, e);
            }
        }
    }
    info!("Mail worker stopped ({} delivered, {} failed).", delivered, failed);
}

const TASK_ASSIGNED: &str = r#"<h3>New Task Assigned</h3>
<p><b>Title:</b> {{title}}</p>
<p><b>Due:</b> {{due}}</p>
<p><b>Priority:</b> {{priority}}</p>"#;

const TASK_UPDATED: &str = r#"<h3>Task Updated</h3>
<p><b>Title:</b> {{title}}</p>
<p><b>Status:</b> {{status}}</p>
<p><b>Due:</b> {{due}}</p>"#;

const DUE_REMINDER: &str = r#"<p>Dear {{name}},</p>
<p>This is a reminder that the following task is due tomorrow:</p>
<p><b>{{title}}</b></p>
<p>Priority: {{priority}}</p>
<br/>
<p>Please ensure timely completion.</p>"#;

const STAFF_CREDENTIALS: &str = r#"<h3>Welcome {{name}}</h3>
<p>Your staff account has been created.</p>
<p><strong>Employee ID:</strong> {{emp_id}}</p>
<p><strong>Password:</strong> {{password}}</p>
<p style="color:red"><b>Please change your password after first login.</b></p>"#;

const PASSWORD_RESET: &str = r#"<p>Dear {{name}},</p>
<p>A password reset was requested for employee ID {{emp_id}}.</p>
<p><a href="{{{link}}}">Choose a new password</a></p>
<p>The link works once.</p>"#;

/// Renders the notification mails and hands them to the outbox. Rendering
/// problems are logged and the mail is skipped.
#[derive(Clone)]
pub struct Notifier {
    templates: Arc<Handlebars<'static>>,
    outbox: Outbox,
    public_url: Arc<str>,
}

impl Notifier {
    pub fn new(outbox: Outbox, public_url: &str) -> Result<Self> {
        let mut templates = Handlebars::new();
        for (name, source) in [
            ("task_assigned", TASK_ASSIGNED),
            ("task_updated", TASK_UPDATED),
            ("due_reminder", DUE_REMINDER),
            ("staff_credentials", STAFF_CREDENTIALS),
            ("password_reset", PASSWORD_RESET),
        ] {
            templates
                .register_template_string(name, source)
                .map_err(|e| anyhow!("Failed to register mail template {}: {}", name, e))?;
        }

        Ok(Self {
            templates: Arc::new(templates),
            outbox,
            public_url: Arc::from(public_url.trim_end_matches('/')),
        })
    }

    pub fn task_assigned(&self, to: &str, task: &Task) {
        self.queue(
            "task_assigned",
            to,
            format!("New Task Assigned: {}", task.title),
            json!({
                "title": task.title,
                "due": task.due_date.to_rfc2822(),
                "priority": task.priority.as_str(),
            }),
        );
    }

    pub fn task_updated(&self, to: &str, task: &Task) {
        self.queue(
            "task_updated",
            to,
            format!("Task Updated: {}", task.title),
            json!({
                "title": task.title,
                "status": task.status.as_str(),
                "due": task.due_date.to_rfc2822(),
            }),
        );
    }

    pub fn due_reminder(&self, to: &str, name: &str, task: &Task) {
        self.queue(
            "due_reminder",
            to,
            "Task Due Tomorrow".to_string(),
            json!({
                "name": name,
                "title": task.title,
                "priority": task.priority.as_str(),
            }),
        );
    }

    pub fn staff_credentials(&self, staff: &Staff, password: &str) {
        self.queue(
            "staff_credentials",
            &staff.email,
            "Your Staff Account Credentials".to_string(),
            json!({
                "name": staff.name,
                "emp_id": staff.emp_id,
                "password": password,
            }),
        );
    }

    pub fn password_reset(&self, staff: &Staff, token: &str) {
        let link = format!("{}/reset-password?ref={}", self.public_url, token);
        self.queue(
            "password_reset",
            &staff.email,
            "Reset your password".to_string(),
            json!({
                "name": staff.name,
                "emp_id": staff.emp_id,
                "link": link,
            }),
        );
    }

    fn queue(&self, template: &str, to: &str, subject: String, data: serde_json::Value) {
        match self.templates.render(template, &data) {
            Ok(html) => self.outbox.enqueue(OutgoingMail {
                to: to.to_string(),
                subject,
                html,
            }),
            Err(e) => warn!("Could not render '{}' mail for {}: {}", template, to, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use taskdesk_common::{TaskPriority, TaskStatus};

    fn task(title: &str) -> Task {
        let at = Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap();
        Task {
            id: 1,
            title: title.to_string(),
            description: "d".into(),
            department_id: 1,
            assigned_to: 1,
            assigned_by: 1,
            due_date: at,
            priority: TaskPriority::Urgent,
            status: TaskStatus::Pending,
            reminder_sent: false,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_worker_delivers_in_order_and_survives_failures() {
        let mailer = Arc::new(MemoryMailer::rejecting(&["bounce@college.edu"]));
        let (outbox, worker) = Outbox::start(mailer.clone());
        let notifier = Notifier::new(outbox.clone(), "http://localhost:3000/").unwrap();

        notifier.task_assigned("a@college.edu", &task("First"));
        notifier.task_assigned("bounce@college.edu", &task("Lost"));
        notifier.task_updated("b@college.edu", &task("Second"));

        drop(notifier);
        drop(outbox);
        worker.await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "New Task Assigned: First");
        assert!(sent[0].html.contains("URGENT"));
        assert_eq!(sent[1].to, "b@college.edu");
        assert!(sent[1].html.contains("PENDING"));
    }

    #[tokio::test]
    async fn test_templates_escape_user_text() {
        let mailer = Arc::new(MemoryMailer::default());
        let (outbox, worker) = Outbox::start(mailer.clone());
        let notifier = Notifier::new(outbox.clone(), "http://localhost:3000/").unwrap();

        notifier.due_reminder("a@college.edu", "Asha", &task("<script>x</script>"));
        drop(notifier);
        drop(outbox);
        worker.await.unwrap();

        let html = &mailer.sent()[0].html;
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("Dear Asha"));
    }

    #[tokio::test]
    async fn test_reset_link_uses_public_url() {
        let mailer = Arc::new(MemoryMailer::default());
        let (outbox, worker) = Outbox::start(mailer.clone());
        let notifier = Notifier::new(outbox.clone(), "https://tasks.college.edu/").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap();
        let staff = Staff {
            id: 1,
            emp_id: "CSE-01".into(),
            name: "Asha".into(),
            email: "asha@college.edu".into(),
            phone: "9876543210".into(),
            department_id: 1,
            role: taskdesk_common::Role::Staff,
            password_hash: String::new(),
            is_active: true,
            required_change_password: true,
            password_reset_token: None,
            password_reset_valid: false,
            password_changed_at: None,
            password_reset_at: None,
            created_at: at,
        };

        notifier.password_reset(&staff, "tok123");
        drop(notifier);
        drop(outbox);
        worker.await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent[0].to, "asha@college.edu");
        assert!(sent[0].html.contains("https://tasks.college.edu/reset-password?ref=tok123"));
    }
}
