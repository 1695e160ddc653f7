//! Process-wide cache of fluency-gate corpus lookups.
//!
//! The ayah corpus is immutable at runtime, so page contents and the page
//! list are cached forever once read.

use std::sync::Arc;

use dashmap::DashMap;

use hifz_backend_domain::Ayah;

#[derive(Debug, Clone, Default)]
pub struct PageCache {
    pages: Arc<DashMap<i32, Arc<Vec<Ayah>>>>,
    page_numbers: Arc<DashMap<(), Arc<Vec<i32>>>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self {
            pages: Arc::new(DashMap::new()),
            page_numbers: Arc::new(DashMap::new()),
        }
    }

    pub fn page(&self, page_number: i32) -> Option<Arc<Vec<Ayah>>> {
        self.pages.get(&page_number).map(|entry| entry.clone())
    }

    pub fn store_page(&self, page_number: i32, ayahs: Vec<Ayah>) -> Arc<Vec<Ayah>> {
        let ayahs = Arc::new(ayahs);
        self.pages.insert(page_number, ayahs.clone());
        ayahs
    }

    pub fn page_numbers(&self) -> Option<Arc<Vec<i32>>> {
        self.page_numbers.get(&()).map(|entry| entry.clone())
    }

    pub fn store_page_numbers(&self, numbers: Vec<i32>) -> Arc<Vec<i32>> {
        let numbers = Arc::new(numbers);
        self.page_numbers.insert((), numbers.clone());
        numbers
    }
}
