//! Bitbucket Server endpoints

use ocd_ci_models::models::{Branch, Page};

use crate::http::client::CiClient;
use crate::errors::CiError;

const PAGE_LIMIT: u32 = 100;

/// Upper bound on pages fetched for one listing
const MAX_PAGES: usize = 20;

impl CiClient {
    /// All branches of `project/repo`, following pagination
    pub async fn branches(&self, project: &str, repo: &str) -> Result<Vec<Branch>, CiError> {
        let mut branches = Vec::new();
        let mut start = 0;
        for _ in 0..MAX_PAGES {
            let page: Page<Branch> = self
                .get(&format!(
                    "/rest/api/1.0/projects/{}/repos/{}/branches?limit={}&start={}&details=true",
                    project, repo, PAGE_LIMIT, start
                ))
                .await?;
            branches.extend(page.values);
            match page.next_page_start {
                Some(next) if !page.is_last_page => start = next,
                _ => break,
            }
        }
        Ok(branches)
    }
}
