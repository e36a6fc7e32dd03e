use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt; // For `collect`
use serde_json::{Value, json};
use sqlx::SqlitePool;
use std::sync::Arc;
use taskdesk_common::{Hod, Role, Staff};
use taskdesk_server::{
    AppState,
    auth::{self, SessionKeys, SessionUser},
    clock::ManualClock,
    database::{self, accounts},
    mail::{MemoryMailer, Notifier, OutgoingMail, Outbox},
    routes::create_router,
};
use tower::ServiceExt; // For `oneshot`

const CRON_SECRET: &str = "cron-secret";
const HOD_PASSWORD: &str = "Hod@12345";
const STAFF_PASSWORD: &str = "Staff#Pass1";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap()
}

struct TestApp {
    app: Router,
    state: AppState,
    clock: Arc<ManualClock>,
    mailer: Arc<MemoryMailer>,
}

/// Router over a fresh in-memory database, a manual clock and a recording mailer.
async fn spawn_app() -> TestApp {
    let pool = database::establish_connection_pool("sqlite::memory:", 1)
        .await
        .expect("Failed to open in-memory SQLite");
    let clock = Arc::new(ManualClock::new(t0()));
    let mailer = Arc::new(MemoryMailer::default());
    let (outbox, _worker) = Outbox::start(mailer.clone());
    let notifier = Notifier::new(outbox, "http://localhost:3000").expect("templates");

    let state = AppState {
        pool,
        sessions: Arc::new(SessionKeys::new("test-secret", 1, "taskdesk_session")),
        notifier,
        clock: clock.clone(),
        cron_secret: Some(CRON_SECRET.to_string()),
    };

    TestApp {
        app: create_router(state.clone()),
        state,
        clock,
        mailer,
    }
}

impl TestApp {
    fn pool(&self) -> &SqlitePool {
        &self.state.pool
    }

    async fn department(&self, code: &str) -> i64 {
        accounts::upsert_department(self.pool(), code, code, "").await.unwrap()
    }

    async fn hod(&self, emp_id: &str, department_id: i64) -> Hod {
        accounts::create_hod(
            self.pool(),
            accounts::NewHod {
                name: format!("HOD {}", emp_id),
                emp_id: emp_id.to_string(),
                email: format!("{}@college.edu", emp_id.to_lowercase()),
                department_id,
                password_hash: auth::hash_password(HOD_PASSWORD).unwrap(),
            },
            t0(),
        )
        .await
        .unwrap()
    }

    async fn staff(&self, emp_id: &str, department_id: i64) -> Staff {
        accounts::create_staff(
            self.pool(),
            accounts::NewStaff {
                emp_id: emp_id.to_string(),
                name: format!("Staff {}", emp_id),
                email: format!("{}@college.edu", emp_id.to_lowercase()),
                phone: "9876543210".to_string(),
                department_id,
                password_hash: auth::hash_password(STAFF_PASSWORD).unwrap(),
            },
            t0(),
        )
        .await
        .unwrap()
    }

    fn hod_token(&self, hod: &Hod) -> String {
        self.token(hod.id, &hod.name, &hod.emp_id, &hod.email, Role::Hod, hod.department_id)
    }

    fn staff_token(&self, staff: &Staff) -> String {
        self.token(staff.id, &staff.name, &staff.emp_id, &staff.email, Role::Staff, staff.department_id)
    }

    fn token(&self, id: i64, name: &str, emp_id: &str, email: &str, role: Role, department: i64) -> String {
        self.state
            .sessions
            .issue(&SessionUser {
                id,
                name: name.to_string(),
                emp_id: emp_id.to_string(),
                email: email.to_string(),
                role,
                department,
            })
            .unwrap()
    }

    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let (status, _, body) = self.call_raw(method, uri, token, body).await;
        (status, body)
    }

    async fn call_raw(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, json)
    }

    /// Waits for the outbox worker to deliver at least `count` mails.
    async fn mails(&self, count: usize) -> Vec<OutgoingMail> {
        for _ in 0..200 {
            let sent = self.mailer.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("expected {} mails, got {:?}", count, self.mailer.sent());
    }
}

fn task_body(department: i64, assigned_to: i64, due: &str) -> Value {
    json!({
        "title": "Prepare lab manual",
        "description": "Revise the data structures lab manual",
        "department": department,
        "assignedTo": assigned_to,
        "dueDate": due,
    })
}

#[tokio::test]
async fn test_assign_sweep_and_visibility() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    let it = t.department("IT").await;
    let hod_a = t.hod("HOD-CSE", cse).await;
    let hod_b = t.hod("HOD-IT", it).await;
    let token_a = t.hod_token(&hod_a);
    let token_b = t.hod_token(&hod_b);

    // Act: HOD A opens an account for CSE-01
    let (status, body) = t
        .call(
            "POST",
            "/staff",
            Some(&token_a),
            Some(json!({
                "empId": "CSE-01",
                "firstName": "Asha",
                "lastName": "Rao",
                "email": "Asha.Rao@college.edu",
                "phone": "9876543210",
                "department": cse,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["staff"]["empId"], "CSE-01");
    assert_eq!(body["staff"]["email"], "asha.rao@college.edu");

    let credentials = t.mails(1).await;
    assert_eq!(credentials[0].to, "asha.rao@college.edu");
    assert!(credentials[0].html.contains("CSE-01"));

    let staff = accounts::find_staff_by_emp_id(t.pool(), "CSE-01").await.unwrap().unwrap();
    assert!(staff.required_change_password);

    // Act: assign a task due tomorrow with no priority
    let (status, created) = t
        .call("POST", "/task", Some(&token_a), Some(task_body(cse, staff.id, "2026-05-05T08:00:00Z")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Task created successfully");
    let task = &created["task"];
    assert_eq!(task["status"], "PENDING");
    assert_eq!(task["priority"], "MEDIUM");
    assert_eq!(task["assignedBy"], hod_a.id);

    // Act: time passes and the sweep runs
    t.clock.advance(Duration::days(2));
    let (status, body) = t.call("POST", "/task/mark-overdue", Some(&token_a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modifiedCount"], 1);

    let (_, body) = t.call("POST", "/task/mark-overdue", Some(&token_a), None).await;
    assert_eq!(body["modifiedCount"], 0);

    // Assert: the assignee sees it as overdue, the other department never does
    let staff_token = t.staff_token(&staff);
    let (status, mine) = t.call("GET", "/task", Some(&staff_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let mine = mine["tasks"].as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["id"], task["id"]);
    assert_eq!(mine[0]["status"], "OVERDUE");
    assert_eq!(mine[0]["assignerEmpId"], "HOD-CSE");

    let (status, theirs) = t.call("GET", "/task", Some(&token_b), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(theirs["tasks"].as_array().unwrap().is_empty());

    // Assert: the assignment mail went out
    let mails = t.mails(2).await;
    assert_eq!(mails[1].subject, "New Task Assigned: Prepare lab manual");
}

#[tokio::test]
async fn test_cross_department_writes_are_forbidden() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    let it = t.department("IT").await;
    let hod_a = t.hod("HOD-CSE", cse).await;
    let token_a = t.hod_token(&hod_a);
    let it_staff = t.staff("IT-01", it).await;

    let (status, _) = t
        .call(
            "POST",
            "/staff",
            Some(&token_a),
            Some(json!({
                "empId": "IT-02",
                "firstName": "Ravi",
                "lastName": "Kumar",
                "email": "ravi@college.edu",
                "phone": "9876543210",
                "department": it,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(accounts::find_staff_by_emp_id(t.pool(), "IT-02").await.unwrap().is_none());

    // A task for another department, and one for our department but assigned across
    let (status, _) = t
        .call("POST", "/task", Some(&token_a), Some(task_body(it, it_staff.id, "2026-05-10")))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t
        .call("POST", "/task", Some(&token_a), Some(task_body(cse, it_staff.id, "2026-05-10")))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t.call("GET", "/staff/IT-01", Some(&token_a), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_task_validation_errors_are_listed() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    let hod = t.hod("HOD-CSE", cse).await;
    let token = t.hod_token(&hod);

    let (status, body) = t
        .call(
            "POST",
            "/task",
            Some(&token),
            Some(json!({ "title": "  ", "dueDate": "next tuesday", "priority": "urgent" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors: Vec<&str> = body["errors"].as_array().unwrap().iter().map(|e| e.as_str().unwrap()).collect();
    assert!(errors.contains(&"title is required"));
    assert!(errors.contains(&"description is required"));
    assert!(errors.contains(&"assignedTo is required"));
    assert!(errors.contains(&"dueDate is not a valid date"));
    assert!(errors.contains(&"Invalid priority: urgent"));

    let staff = t.staff("CSE-01", cse).await;
    let (status, _) = t
        .call("POST", "/task", Some(&t.staff_token(&staff)), Some(task_body(cse, staff.id, "2026-05-10")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_only_the_creating_hod_updates_a_task() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    let creator = t.hod("HOD-CSE", cse).await;
    let colleague = t.hod("HOD-CSE-2", cse).await;
    let staff = t.staff("CSE-01", cse).await;
    let creator_token = t.hod_token(&creator);

    let (_, task) = t
        .call("POST", "/task", Some(&creator_token), Some(task_body(cse, staff.id, "2026-05-10")))
        .await;
    let task = &task["task"];
    let id = task["id"].as_i64().unwrap();

    let (status, _) = t
        .call("PUT", "/task", Some(&t.hod_token(&colleague)), Some(json!({ "id": id, "status": "COMPLETED" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Partial update: only the priority changes
    let (status, updated) = t
        .call("PUT", "/task", Some(&creator_token), Some(json!({ "id": id, "priority": "HIGH" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["message"], "Task updated successfully");
    assert_eq!(updated["task"]["priority"], "HIGH");
    assert_eq!(updated["task"]["title"], task["title"]);
    assert_eq!(updated["task"]["status"], "PENDING");

    let (status, updated) = t
        .call("PUT", "/task", Some(&creator_token), Some(json!({ "id": id, "status": "COMPLETED" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["task"]["status"], "COMPLETED");

    let (status, body) = t
        .call("PUT", "/task", Some(&creator_token), Some(json!({ "id": id, "status": "OVERDUE" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!(["cannot move task from COMPLETED to OVERDUE"]));

    let (status, _) = t
        .call("PUT", "/task", Some(&creator_token), Some(json!({ "id": 9999, "title": "ghost" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_assignee_moves_own_task() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    let hod = t.hod("HOD-CSE", cse).await;
    let owner = t.staff("CSE-01", cse).await;
    let other = t.staff("CSE-02", cse).await;
    let hod_token = t.hod_token(&hod);

    let (_, task) = t
        .call("POST", "/task", Some(&hod_token), Some(task_body(cse, owner.id, "2026-05-10")))
        .await;
    let id = task["task"]["id"].as_i64().unwrap();
    let patch = json!({ "id": id, "status": "IN_PROGRESS" });

    let (status, _) = t.call("PATCH", "/task/status", Some(&t.staff_token(&other)), Some(patch.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.call("PATCH", "/task/status", Some(&hod_token), Some(patch.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let owner_token = t.staff_token(&owner);
    let (status, moved) = t.call("PATCH", "/task/status", Some(&owner_token), Some(patch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["task"]["status"], "IN_PROGRESS");

    // Staff cannot send it back to PENDING
    let (status, body) = t
        .call("PATCH", "/task/status", Some(&owner_token), Some(json!({ "id": id, "status": "PENDING" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!(["cannot move task from IN_PROGRESS to PENDING"]));

    let (status, profile) = t.call("GET", "/staff/CSE-01", Some(&hod_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["stats"]["total"], 1);
    assert_eq!(profile["stats"]["byStatus"]["IN_PROGRESS"], 1);
    assert!(profile["staff"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_hod_login_lockout_over_http() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    t.hod("HOD001", cse).await;
    let wrong = json!({ "empId": "HOD001", "password": "not-it" });
    let right = json!({ "empId": "HOD001", "password": HOD_PASSWORD });

    for _ in 0..5 {
        let (status, body) = t.call("POST", "/auth/login", None, Some(wrong.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid Employee ID or password");
    }

    let (status, _) = t.call("POST", "/auth/login", None, Some(right.clone())).await;
    assert_eq!(status, StatusCode::LOCKED);

    t.clock.advance(Duration::minutes(16));
    let (status, headers, body) = t.call_raw("POST", "/auth/login", None, Some(right)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["empId"], "HOD001");
    assert_eq!(body["user"]["role"], "HOD");

    // The cookie alone is enough to be recognised
    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    let pair = cookie.split(';').next().unwrap().to_string();
    let request = Request::builder()
        .uri("/auth/session")
        .header(header::COOKIE, pair)
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = t.call("GET", "/auth/session", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_reset_link_works_once() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    let hod = t.hod("HOD-CSE", cse).await;
    t.staff("CSE-01", cse).await;

    let (status, _) = t
        .call(
            "POST",
            "/staff/reset-password/issue",
            Some(&t.hod_token(&hod)),
            Some(json!({ "empId": "CSE-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let mail = t.mails(1).await.remove(0);
    assert_eq!(mail.to, "cse-01@college.edu");
    let token = mail
        .html
        .split("?ref=")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap()
        .to_string();

    let (status, body) = t.call("GET", &format!("/staff/reset-password?ref={}", token), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["empId"], "CSE-01");

    let (status, _) = t
        .call("POST", "/staff/reset-password", None, Some(json!({ "ref": token, "password": "short" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let reset = json!({ "token": token, "password": "Fresh#Pass2026" });
    let (status, _) = t.call("POST", "/staff/reset-password", None, Some(reset.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t.call("POST", "/staff/reset-password", None, Some(reset)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Invalid or expired reset token");

    let (status, body) = t.call("GET", &format!("/staff/reset-password?ref={}", token), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["valid"], false);

    let (status, body) = t.call("GET", "/staff/reset-password", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["valid"], false);

    let (status, body) = t
        .call(
            "POST",
            "/auth/staff/login",
            None,
            Some(json!({ "empId": "CSE-01", "password": "Fresh#Pass2026" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requiredChangePassword"], false);
}

#[tokio::test]
async fn test_staff_management() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    let hod = t.hod("HOD-CSE", cse).await;
    let token = t.hod_token(&hod);
    let staff = t.staff("CSE-01", cse).await;

    // Duplicate employee id, then a bad phone number
    let mut body = json!({
        "empId": "CSE-01",
        "firstName": "Asha",
        "lastName": "Rao",
        "email": "new@college.edu",
        "phone": "9876543210",
        "department": cse,
    });
    let (status, _) = t.call("POST", "/staff", Some(&token), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    body["empId"] = json!("CSE-02");
    body["phone"] = json!("12345");
    let (status, errors) = t.call("POST", "/staff", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(errors["errors"], json!(["phone must be exactly 10 digits"]));

    // Staff changes the generated password
    let staff_token = t.staff_token(&staff);
    let (status, _) = t
        .call(
            "PUT",
            "/staff/password",
            Some(&staff_token),
            Some(json!({ "currentPassword": "wrong", "newPassword": "Another#Pass1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = t
        .call(
            "PUT",
            "/staff/password",
            Some(&staff_token),
            Some(json!({ "currentPassword": STAFF_PASSWORD, "newPassword": "Another#Pass1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let reloaded = accounts::find_staff(t.pool(), staff.id).await.unwrap().unwrap();
    assert!(!reloaded.required_change_password);

    // Deactivation is soft and blocks login
    let (status, _) = t
        .call("PUT", "/staff/inactive", Some(&token), Some(json!({ "empId": "CSE-01" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t
        .call("PUT", "/staff/inactive", Some(&token), Some(json!({ "empId": "CSE-99" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, roster) = t.call("GET", "/staff", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roster["staff"][0]["isActive"], false);

    let (status, _) = t
        .call(
            "POST",
            "/auth/staff/login",
            None,
            Some(json!({ "empId": "CSE-01", "password": "Another#Pass1" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_empty_dashboard_is_all_zero() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    let hod = t.hod("HOD-CSE", cse).await;
    let staff = t.staff("CSE-01", cse).await;

    let (status, body) = t.call("GET", "/dashboard", Some(&t.hod_token(&hod)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["department"]["code"], "CSE");
    assert_eq!(body["tasks"]["total"], 0);
    assert_eq!(body["staff"]["total"], 1);
    assert_eq!(body["performance"], json!({ "efficiency": 0, "overdueRate": 0 }));
    assert_eq!(body["distribution"], json!([]));

    let (status, _) = t.call("GET", "/dashboard", Some(&t.staff_token(&staff)), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.call("GET", "/dashboard", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_scheduled_trigger_needs_the_secret() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    let hod = t.hod("HOD-CSE", cse).await;
    let staff = t.staff("CSE-01", cse).await;
    let token = t.hod_token(&hod);

    t.call("POST", "/task", Some(&token), Some(task_body(cse, staff.id, "2026-05-03T08:00:00Z"))).await;
    t.call("POST", "/task", Some(&token), Some(task_body(cse, staff.id, "2026-05-05T10:00:00Z"))).await;

    let (status, _) = t.call("GET", "/cron/task-automation", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.call("GET", "/cron/task-automation", Some("nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // A session token is not the scheduler secret
    let (status, _) = t.call("GET", "/cron/task-automation", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = t.call("GET", "/cron/task-automation", Some(CRON_SECRET), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task automation completed");
    assert_eq!(body["modifiedCount"], 1);
    assert_eq!(body["remindersSent"], 1);

    // Two assignment mails, then the reminder
    let mails = t.mails(3).await;
    assert_eq!(mails[2].subject, "Task Due Tomorrow");

    let (_, body) = t.call("GET", "/cron/task-automation", Some(CRON_SECRET), None).await;
    assert_eq!(body["modifiedCount"], 0);
    assert_eq!(body["remindersSent"], 0);
}

#[tokio::test]
async fn test_malformed_bodies_are_validation_errors() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    let hod = t.hod("HOD-CSE", cse).await;
    let token = t.hod_token(&hod);
    let staff = t.staff("CSE-01", cse).await;

    // Missing required fields
    let (status, body) = t.call("POST", "/auth/login", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"][0].as_str().unwrap().contains("empId"));

    let (status, body) = t.call("PUT", "/staff/inactive", Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);

    // Wrong type for a numeric field
    let mut task = task_body(cse, staff.id, "2026-05-10");
    task["department"] = json!("CSE");
    let (status, body) = t.call("POST", "/task", Some(&token), Some(task)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"][0].as_str().unwrap().contains("department"));

    // A status on create is checked even though new tasks start PENDING
    let mut task = task_body(cse, staff.id, "2026-05-10");
    task["status"] = json!("DONE");
    let (status, body) = t.call("POST", "/task", Some(&token), Some(task)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!(["Invalid status: DONE"]));

    let mut task = task_body(cse, staff.id, "2026-05-10");
    task["status"] = json!("COMPLETED");
    let (status, body) = t.call("POST", "/task", Some(&token), Some(task)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["task"]["status"], "PENDING");
}

#[tokio::test]
async fn test_inactive_staff_cannot_be_assigned() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    let hod = t.hod("HOD-CSE", cse).await;
    let token = t.hod_token(&hod);
    let active = t.staff("CSE-01", cse).await;
    let leaver = t.staff("CSE-02", cse).await;
    accounts::deactivate_staff(t.pool(), cse, "CSE-02").await.unwrap();

    let (status, body) = t
        .call("POST", "/task", Some(&token), Some(task_body(cse, leaver.id, "2026-05-10")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!(["staff CSE-02 is inactive"]));

    // Reassigning an existing task to them is refused too
    let (_, created) = t
        .call("POST", "/task", Some(&token), Some(task_body(cse, active.id, "2026-05-10")))
        .await;
    let id = created["task"]["id"].as_i64().unwrap();
    let (status, _) = t
        .call("PUT", "/task", Some(&token), Some(json!({ "id": id, "assignedTo": leaver.id })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = t.call("GET", "/task", Some(&token), None).await;
    assert_eq!(listed["tasks"][0]["assignedTo"], active.id);
}

#[tokio::test]
async fn test_reset_accepts_ref_when_token_is_blank() {
    let t = spawn_app().await;
    let cse = t.department("CSE").await;
    let staff = t.staff("CSE-01", cse).await;
    accounts::issue_reset_token(t.pool(), staff.id, "known-token").await.unwrap();

    let (status, _) = t
        .call(
            "POST",
            "/staff/reset-password",
            None,
            Some(json!({ "token": "", "ref": "known-token", "password": "Fresh#Pass2026" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
