use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use records_admin::models::*;
use records_admin::notify::{MemoryNotifier, Notifier};
use records_admin::config::parse_api_url;
use records_admin::scores::RemoveOutcome;
use records_admin::{Config, GatewayError, HttpGateway, ScoreMatrix, SearchState};

// --- stub gateway ---

struct ResultRow {
    id: i64,
    student_id: i64,
    course_id: i64,
    score: f64,
}

struct Stub {
    students: Vec<Student>,
    courses: Vec<Course>,
    results: Vec<ResultRow>,
    next_id: i64,
    queries: Vec<HashMap<String, String>>,
}

type Shared = Arc<Mutex<Stub>>;
type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(json!({"status": status.as_u16(), "error": "stub", "message": message})),
    )
}

fn grouped(st: &Stub, student_id: i64) -> StudentScores {
    let mut course_ids: Vec<i64> = st
        .results
        .iter()
        .filter(|r| r.student_id == student_id)
        .map(|r| r.course_id)
        .collect();
    course_ids.sort();
    course_ids.dedup();
    let courses = course_ids
        .into_iter()
        .map(|cid| {
            let name = st
                .courses
                .iter()
                .find(|c| c.id == Some(cid))
                .map(|c| c.name.clone())
                .unwrap_or_default();
            let mut row = CourseScores::empty(cid, name);
            let filled = st
                .results
                .iter()
                .filter(|r| r.student_id == student_id && r.course_id == cid);
            for (slot, r) in row.scores.iter_mut().zip(filled) {
                *slot = ScoreEntry {
                    id: Some(r.id),
                    score: Some(r.score),
                };
            }
            row
        })
        .collect();
    StudentScores { courses }
}

async fn list_students(
    State(s): State<Shared>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Page<Student>> {
    let mut st = s.lock().unwrap();
    st.queries.push(q.clone());
    let term = q.get("search").map(|t| t.to_lowercase());
    let content: Vec<Student> = st
        .students
        .iter()
        .filter(|s| term.as_ref().map_or(true, |t| s.full_name.to_lowercase().contains(t)))
        .cloned()
        .collect();
    Json(Page {
        total_elements: content.len() as u64,
        content,
    })
}

async fn create_student(State(s): State<Shared>, Json(body): Json<Value>) -> Result<Json<Student>, ApiError> {
    if body.get("id").is_some() {
        return Err(api_error(StatusCode::BAD_REQUEST, "id must not be sent"));
    }
    let mut student: Student =
        serde_json::from_value(body).map_err(|e| api_error(StatusCode::BAD_REQUEST, &e.to_string()))?;
    let mut st = s.lock().unwrap();
    if st.students.iter().any(|x| x.number == student.number) {
        return Err(api_error(
            StatusCode::CONFLICT,
            "Duplicate value violates unique constraint",
        ));
    }
    st.next_id += 1;
    student.id = Some(st.next_id);
    st.students.push(student.clone());
    Ok(Json(student))
}

async fn get_student(State(s): State<Shared>, Path(id): Path<i64>) -> Result<Json<Student>, ApiError> {
    let st = s.lock().unwrap();
    st.students
        .iter()
        .find(|x| x.id == Some(id))
        .cloned()
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Student not found"))
}

async fn delete_student(State(s): State<Shared>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    let mut st = s.lock().unwrap();
    let before = st.students.len();
    st.students.retain(|x| x.id != Some(id));
    if st.students.len() == before {
        return Err(api_error(StatusCode::NOT_FOUND, "Student not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn get_scores(State(s): State<Shared>, Path(id): Path<i64>) -> Json<StudentScores> {
    let st = s.lock().unwrap();
    Json(grouped(&st, id))
}

async fn save_scores(
    State(s): State<Shared>,
    Path(student_id): Path<i64>,
    Json(req): Json<SaveScoresRequest>,
) -> Json<StudentScores> {
    let mut st = s.lock().unwrap();
    for entry in &req.courses {
        for slot in entry.scores {
            match (slot.id, slot.score) {
                (Some(id), None) => st.results.retain(|r| r.id != id),
                (Some(id), Some(score)) => {
                    if let Some(r) = st.results.iter_mut().find(|r| r.id == id) {
                        r.score = score;
                    }
                }
                (None, Some(score)) => {
                    st.next_id += 1;
                    let id = st.next_id;
                    st.results.push(ResultRow {
                        id,
                        student_id,
                        course_id: entry.course_id,
                        score,
                    });
                }
                (None, None) => {}
            }
        }
    }
    Json(grouped(&st, student_id))
}

async fn broken_stats() -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "stack trace here")
}

async fn forbidden_courses() -> ApiError {
    api_error(StatusCode::FORBIDDEN, "no")
}

fn seeded() -> Stub {
    Stub {
        students: vec![
            Student {
                id: Some(1),
                full_name: "Ann Lee".into(),
                number: 1001,
                email: "ann@example.com".into(),
                ..Default::default()
            },
            Student {
                id: Some(2),
                full_name: "Bob Ray".into(),
                number: 1002,
                email: "bob@example.com".into(),
                gsm_number: Some("555-0102".into()),
                ..Default::default()
            },
        ],
        courses: vec![
            Course { id: Some(10), name: "Math".into() },
            Course { id: Some(11), name: "Physics".into() },
        ],
        results: vec![
            ResultRow { id: 100, student_id: 1, course_id: 10, score: 90.0 },
            ResultRow { id: 101, student_id: 1, course_id: 10, score: 85.0 },
        ],
        next_id: 200,
        queries: Vec::new(),
    }
}

struct Harness {
    stub: Shared,
    notifier: Arc<MemoryNotifier>,
    gateway: HttpGateway,
}

async fn start() -> Harness {
    let stub: Shared = Arc::new(Mutex::new(seeded()));
    let app = Router::new()
        .route("/api/students", get(list_students).post(create_student))
        .route("/api/students/:id", get(get_student).delete(delete_student))
        .route("/api/courses", get(forbidden_courses))
        .route("/api/exam-results/student/:id", get(get_scores).put(save_scores))
        .route("/api/dashboard/stats", get(broken_stats))
        .with_state(stub.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let notifier = Arc::new(MemoryNotifier::new());
    let gateway = HttpGateway::new(&config_for(addr), notifier.clone() as Arc<dyn Notifier>).unwrap();
    Harness { stub, notifier, gateway }
}

fn config_for(addr: SocketAddr) -> Config {
    Config::new(parse_api_url(&format!("http://{addr}/api/")).unwrap())
}

// --- tests ---

#[test_log::test(tokio::test)]
async fn list_sends_paging_and_optional_search() {
    let h = start().await;
    let mut state = SearchState::new(10);

    let page = h.gateway.list_students(&state.refresh()).await.unwrap();
    assert_eq!(page.total_elements, 2);

    state.input("ann");
    let q = state.settle().unwrap();
    let page = h.gateway.list_students(&q).await.unwrap();
    assert_eq!(page.content.len(), 1);
    assert_eq!(page.content[0].full_name, "Ann Lee");

    let queries = h.stub.lock().unwrap().queries.clone();
    assert_eq!(queries[0].get("page").map(String::as_str), Some("0"));
    assert_eq!(queries[0].get("size").map(String::as_str), Some("10"));
    assert!(!queries[0].contains_key("search"));
    assert_eq!(queries[1].get("search").map(String::as_str), Some("ann"));
}

#[test_log::test(tokio::test)]
async fn missing_student_is_not_found_without_notification() {
    let h = start().await;
    let err = h.gateway.get_student(99).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(h.notifier.messages().is_empty());
}

#[test_log::test(tokio::test)]
async fn create_omits_id_and_conflict_surfaces_server_message() {
    let h = start().await;
    let draft = Student {
        id: Some(555),
        full_name: "Cem Ak".into(),
        number: 1003,
        email: "cem@example.com".into(),
        ..Default::default()
    };
    let created = h.gateway.create_student(&draft).await.unwrap();
    assert_eq!(created.id, Some(201));

    let err = h.gateway.create_student(&draft).await.unwrap_err();
    assert!(matches!(err, GatewayError::ClientError { status, .. } if status == StatusCode::CONFLICT));
    assert_eq!(
        h.notifier.messages(),
        vec!["Duplicate value violates unique constraint".to_string()]
    );
}

#[test_log::test(tokio::test)]
async fn delete_then_delete_again() {
    let h = start().await;
    h.gateway.delete_student(2).await.unwrap();
    assert!(h.gateway.delete_student(2).await.unwrap_err().is_not_found());
    assert_eq!(h.stub.lock().unwrap().students.len(), 1);
}

#[test_log::test(tokio::test)]
async fn server_and_auth_errors_notify_generically() {
    let h = start().await;
    let err = h.gateway.dashboard_stats().await.unwrap_err();
    assert!(matches!(err, GatewayError::ServerError { .. }));

    let mut state = SearchState::new(10);
    let err = h.gateway.list_courses(&state.refresh()).await.unwrap_err();
    assert!(matches!(err, GatewayError::AuthError { .. }));

    assert_eq!(
        h.notifier.messages(),
        vec!["Server error occurred".to_string(), "Unauthorized".to_string()]
    );
}

#[test_log::test(tokio::test)]
async fn unreachable_gateway_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let notifier = Arc::new(MemoryNotifier::new());
    let gateway = HttpGateway::new(&config_for(addr), notifier.clone() as Arc<dyn Notifier>).unwrap();
    let err = gateway.get_student(1).await.unwrap_err();
    assert!(matches!(err, GatewayError::NetworkError(_)));
    assert_eq!(notifier.messages(), vec!["An unexpected error occurred".to_string()]);
}

#[test_log::test(tokio::test)]
async fn score_matrix_round_trip_through_gateway() {
    let h = start().await;
    let mut matrix = ScoreMatrix::new(1);
    matrix.fetch(&h.gateway).await.unwrap();
    assert_eq!(matrix.rows().len(), 1);
    assert_eq!(matrix.average(0), Some(87.5));
    assert_eq!(matrix.is_completed(0), Some(false));

    matrix.set_score(0, 2, Some("70")).unwrap();
    assert!(matrix.add_course(&Course { id: Some(11), name: "Physics".into() }));
    matrix.set_score(1, 0, Some("60")).unwrap();
    assert!(matrix.is_dirty());

    let saved = matrix.save(&h.gateway).await.unwrap();
    assert_eq!(saved.courses.len(), 2);
    assert!(!matrix.is_dirty());
    assert_eq!(matrix.is_completed(0), Some(true));
    assert!(matrix.rows()[0].scores[2].id.is_some());
    assert_eq!(matrix.rows()[1].scores[0].score, Some(60.0));
    assert!(matrix.rows()[1].scores[0].id.is_some());
}

#[test_log::test(tokio::test)]
async fn removing_persisted_course_deletes_its_results() {
    let h = start().await;
    let mut matrix = ScoreMatrix::new(1);
    matrix.fetch(&h.gateway).await.unwrap();

    let outcome = matrix.remove_course(0, &h.gateway, |_| true).await.unwrap();
    assert_eq!(outcome, RemoveOutcome::RemovedAndPersisted);
    assert!(matrix.rows().is_empty());
    assert!(!matrix.is_dirty());
    assert!(h.stub.lock().unwrap().results.is_empty());

    let mut reloaded = ScoreMatrix::new(1);
    reloaded.fetch(&h.gateway).await.unwrap();
    assert!(reloaded.rows().is_empty());
}
