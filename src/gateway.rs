use async_trait::async_trait;
use chrono::Duration;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::Config;
use crate::error::GatewayError;
use crate::models::*;
use crate::notify::Notifier;
use crate::scores::ScoreStore;
use crate::search::ListQuery;

/// JSON-over-HTTP client for the records gateway.
///
/// Every failure is logged, turned into a notification (404 excepted) and
/// returned to the caller. There are no retries and no request timeout.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base: Url,
    notifier: Arc<dyn Notifier>,
    notification_duration: Duration,
}

impl HttpGateway {
    pub fn new(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self, GatewayError> {
        let client = Client::builder().gzip(true).build()?;
        Ok(HttpGateway {
            client,
            base: config.api_url.clone(),
            notifier,
            notification_duration: Duration::seconds(config.notification_secs),
        })
    }

    // --- students ---

    pub async fn list_students(&self, query: &ListQuery) -> Result<Page<Student>, GatewayError> {
        self.fetch(self.request(Method::GET, &["students"]).query(&query.params())).await
    }

    pub async fn get_student(&self, id: i64) -> Result<Student, GatewayError> {
        self.fetch(self.request(Method::GET, &["students", &id.to_string()])).await
    }

    pub async fn create_student(&self, student: &Student) -> Result<Student, GatewayError> {
        let body = Student {
            id: None,
            ..student.clone()
        };
        self.fetch(self.request(Method::POST, &["students"]).json(&body)).await
    }

    pub async fn update_student(&self, id: i64, student: &Student) -> Result<Student, GatewayError> {
        self.fetch(self.request(Method::PUT, &["students", &id.to_string()]).json(student)).await
    }

    pub async fn delete_student(&self, id: i64) -> Result<(), GatewayError> {
        self.execute(self.request(Method::DELETE, &["students", &id.to_string()])).await?;
        Ok(())
    }

    // --- courses ---

    pub async fn list_courses(&self, query: &ListQuery) -> Result<Page<Course>, GatewayError> {
        self.fetch(self.request(Method::GET, &["courses"]).query(&query.params())).await
    }

    pub async fn get_course(&self, id: i64) -> Result<Course, GatewayError> {
        self.fetch(self.request(Method::GET, &["courses", &id.to_string()])).await
    }

    pub async fn create_course(&self, course: &Course) -> Result<Course, GatewayError> {
        let body = Course {
            id: None,
            name: course.name.clone(),
        };
        self.fetch(self.request(Method::POST, &["courses"]).json(&body)).await
    }

    pub async fn update_course(&self, id: i64, course: &Course) -> Result<Course, GatewayError> {
        self.fetch(self.request(Method::PUT, &["courses", &id.to_string()]).json(course)).await
    }

    pub async fn delete_course(&self, id: i64) -> Result<(), GatewayError> {
        self.execute(self.request(Method::DELETE, &["courses", &id.to_string()])).await?;
        Ok(())
    }

    // --- exam results ---

    pub async fn list_exam_results(&self, query: &ListQuery) -> Result<Page<ExamResultRow>, GatewayError> {
        self.fetch(self.request(Method::GET, &["exam-results"]).query(&query.params())).await
    }

    pub async fn student_scores(&self, student_id: i64) -> Result<StudentScores, GatewayError> {
        self.fetch(self.request(Method::GET, &["exam-results", "student", &student_id.to_string()])).await
    }

    pub async fn save_student_scores(
        &self,
        student_id: i64,
        request: &SaveScoresRequest,
    ) -> Result<StudentScores, GatewayError> {
        let id = student_id.to_string();
        self.fetch(self.request(Method::PUT, &["exam-results", "student", &id]).json(request)).await
    }

    // --- dashboard ---

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, GatewayError> {
        self.fetch(self.request(Method::GET, &["dashboard", "stats"])).await
    }

    // --- helpers ---

    /// `segments` appended to the base path, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // http(s) bases always have a path to extend
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        tracing::debug!(%method, %url, "gateway request");
        self.client.request(method, url)
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GatewayError> {
        let body = self.execute(req).await?;
        serde_json::from_str(&body).map_err(|e| self.fail(e.into()))
    }

    async fn execute(&self, req: RequestBuilder) -> Result<String, GatewayError> {
        let resp = req.send().await.map_err(|e| self.fail(e.into()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.fail(e.into()))?;
        if !status.is_success() {
            return Err(self.fail(GatewayError::from_response(status, &body)));
        }
        Ok(body)
    }

    fn fail(&self, err: GatewayError) -> GatewayError {
        match &err {
            GatewayError::NotFound => tracing::debug!("gateway returned 404"),
            GatewayError::ClientError { .. } | GatewayError::AuthError { .. } => {
                tracing::warn!(error = %err, "gateway rejected request")
            }
            _ => tracing::error!(error = %err, "gateway request failed"),
        }
        if let Some(n) = err.notification() {
            self.notifier.notify(n.with_duration(self.notification_duration));
        }
        err
    }
}

#[async_trait]
impl ScoreStore for HttpGateway {
    async fn load_scores(&self, student_id: i64) -> Result<StudentScores, GatewayError> {
        self.student_scores(student_id).await
    }

    async fn save_scores(
        &self,
        student_id: i64,
        request: &SaveScoresRequest,
    ) -> Result<StudentScores, GatewayError> {
        self.save_student_scores(student_id, request).await
    }
}
