// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use studyloop_core::evaluate::Grader;
use studyloop_core::evaluate::GraderVerdict;
use studyloop_core::evaluate::GradingError;

use crate::error::Context;
use crate::error::Fallible;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Grades open responses by POSTing them as JSON to an external service.
///
/// The service receives `{"prompt", "answer", "submitted"}` and must reply
/// with `{"score", "message", "passed"}`.
pub struct HttpGrader {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct GradeRequest<'a> {
    prompt: &'a str,
    answer: &'a str,
    submitted: &'a str,
}

impl HttpGrader {
    pub fn new(endpoint: &str) -> Fallible<Self> {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(HttpGrader {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl Grader for HttpGrader {
    async fn grade(
        &self,
        prompt: &str,
        answer: &str,
        submitted: &str,
    ) -> Result<GraderVerdict, GradingError> {
        if submitted.trim().is_empty() {
            return Ok(GraderVerdict {
                score: 0,
                message: "No answer given.".to_string(),
                passed: false,
            });
        }
        let request = GradeRequest {
            prompt,
            answer,
            submitted,
        };
        log::debug!("grading open response via {}", self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GradingError::Unavailable(e.to_string()))?;
        let verdict: GraderVerdict = response
            .json()
            .await
            .map_err(|e| GradingError::Malformed(e.to_string()))?;
        if verdict.score > 5 {
            return Err(GradingError::Malformed(format!(
                "score {} is out of range",
                verdict.score
            )));
        }
        Ok(verdict)
    }
}
