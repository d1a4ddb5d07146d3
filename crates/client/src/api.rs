//! Typed endpoints of the learning platform.

use crate::client::AuthenticatedClient;
use problum_types::{
    Attempt, Course, Lesson, Problem, RequestSpec, SubmitResponse, UserProfile, traits::Result,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

#[derive(Deserialize)]
struct CourseList {
    courses: Vec<Course>,
}

#[derive(Deserialize)]
struct AttemptList {
    attempts: Vec<Attempt>,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    language: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct EnrollRequest {
    course_id: u64,
}

/// Course, lesson, problem and attempt endpoints over an [`AuthenticatedClient`].
#[derive(Clone)]
pub struct LearningApi {
    client: AuthenticatedClient,
}

impl LearningApi {
    #[must_use]
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    async fn fetch<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T> {
        self.client.request(spec).await?.error_for_status()?.json()
    }

    /// All published courses.
    ///
    /// # Errors
    ///
    /// Propagates request errors; non-2xx statuses become `ClientError::Http`.
    pub async fn courses(&self) -> Result<Vec<Course>> {
        let list: CourseList = self.fetch(RequestSpec::get("/courses")).await?;
        Ok(list.courses)
    }

    /// # Errors
    ///
    /// Propagates request errors; non-2xx statuses become `ClientError::Http`.
    pub async fn course(&self, id: u64) -> Result<Course> {
        self.fetch(RequestSpec::get(format!("/courses/{id}"))).await
    }

    /// # Errors
    ///
    /// Propagates request errors; non-2xx statuses become `ClientError::Http`.
    pub async fn lesson(&self, course_id: u64, lesson_id: u64) -> Result<Lesson> {
        self.fetch(RequestSpec::get(format!(
            "/courses/{course_id}/lessons/{lesson_id}"
        )))
        .await
    }

    /// A problem with its starter template for `language`.
    ///
    /// # Errors
    ///
    /// Propagates request errors; non-2xx statuses become `ClientError::Http`.
    pub async fn problem(
        &self,
        course_id: u64,
        problem_id: u64,
        language: &str,
    ) -> Result<Problem> {
        let spec = RequestSpec::get(format!("/courses/{course_id}/problems/{problem_id}"))
            .query(&[("language", language)])?;
        self.fetch(spec).await
    }

    /// Submit a solution for judging.
    ///
    /// # Errors
    ///
    /// Propagates request errors; non-2xx statuses become `ClientError::Http`.
    pub async fn submit_attempt(
        &self,
        course_id: u64,
        problem_id: u64,
        language: &str,
        code: &str,
    ) -> Result<SubmitResponse> {
        let spec = RequestSpec::post(format!(
            "/courses/{course_id}/problems/{problem_id}/submit"
        ))
        .json(&SubmitRequest { language, code })?;
        self.fetch(spec).await
    }

    /// # Errors
    ///
    /// Propagates request errors; non-2xx statuses become `ClientError::Http`.
    pub async fn attempt(&self, attempt_id: u64) -> Result<Attempt> {
        self.fetch(RequestSpec::get(format!("/attempts/{attempt_id}")))
            .await
    }

    /// # Errors
    ///
    /// Propagates request errors; non-2xx statuses become `ClientError::Http`.
    pub async fn attempts_for_problem(
        &self,
        course_id: u64,
        problem_id: u64,
    ) -> Result<Vec<Attempt>> {
        let list: AttemptList = self
            .fetch(RequestSpec::get(format!(
                "/courses/{course_id}/problems/{problem_id}/attempts"
            )))
            .await?;
        Ok(list.attempts)
    }

    /// Every attempt of the logged-in user.
    ///
    /// # Errors
    ///
    /// Propagates request errors; non-2xx statuses become `ClientError::Http`.
    pub async fn attempts_for_user(&self) -> Result<Vec<Attempt>> {
        let list: AttemptList = self.fetch(RequestSpec::get("/attempts")).await?;
        Ok(list.attempts)
    }

    /// # Errors
    ///
    /// Propagates request errors; non-2xx statuses become `ClientError::Http`.
    pub async fn enroll(&self, course_id: u64) -> Result<()> {
        let spec = RequestSpec::post("/enrollments").json(&EnrollRequest { course_id })?;
        self.client.request(spec).await?.error_for_status()?;
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates request errors; non-2xx statuses become `ClientError::Http`.
    pub async fn profile(&self) -> Result<UserProfile> {
        self.fetch(RequestSpec::get("/profile")).await
    }
}
