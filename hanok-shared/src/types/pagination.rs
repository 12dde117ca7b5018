use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 { 1 }
fn default_limit() -> u64 { 10 }

impl PaginationParams {
    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1)) * self.limit()
    }

    pub fn limit(&self) -> u64 {
        self.limit.clamp(1, 100)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// Page envelope matching the client contract:
/// `{data, totalCount, page, limit, hasNext}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T: Serialize> {
    pub data: Vec<T>,
    pub total_count: u64,
    pub page: u64,
    pub limit: u64,
    pub has_next: bool,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(data: Vec<T>, total_count: u64, params: &PaginationParams) -> Self {
        let limit = params.limit();
        let has_next = params.page * limit < total_count;
        Self {
            data,
            total_count,
            page: params.page,
            limit,
            has_next,
        }
    }
}
