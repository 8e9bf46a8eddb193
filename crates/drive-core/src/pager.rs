use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::{json, Value};
use tracing::debug;

use crate::embed::Embed;
use crate::state::UserId;

const PREFIX: &str = "ls";

/// Listings kept for button presses; the oldest is dropped beyond this
pub const MAX_LISTINGS: usize = 256;

struct Listing {
    owner: UserId,
    pages: Vec<Embed>,
}

/// Paginated listings awaiting previous/next presses
pub struct PageStore {
    capacity: usize,
    inner: Mutex<(HashMap<String, Listing>, VecDeque<String>)>,
}

impl Default for PageStore {
    fn default() -> Self {
        Self::new(MAX_LISTINGS)
    }
}

impl PageStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new((HashMap::new(), VecDeque::new())),
        }
    }

    /// Keep `pages` and return the key their buttons refer to
    pub fn insert(&self, owner: UserId, pages: Vec<Embed>) -> String {
        let key = uuid::Uuid::new_v4().simple().to_string();
        if let Ok(mut guard) = self.inner.lock() {
            let (listings, order) = &mut *guard;
            while order.len() >= self.capacity {
                if let Some(old) = order.pop_front() {
                    listings.remove(&old);
                    debug!("dropped listing {}", old);
                }
            }
            listings.insert(key.clone(), Listing { owner, pages });
            order.push_back(key.clone());
        }
        key
    }

    /// Page `index` of a listing with the page count, if the listing is
    /// still held and belongs to `user`
    pub fn page(&self, key: &str, index: usize, user: UserId) -> Option<(Embed, usize)> {
        let guard = self.inner.lock().ok()?;
        let listing = guard.0.get(key)?;
        if listing.owner != user {
            return None;
        }
        let page = listing.pages.get(index)?.clone();
        Some((page, listing.pages.len()))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|g| g.0.len()).unwrap_or(0)
    }
}

pub fn custom_id(key: &str, index: usize) -> String {
    format!("{}:{}:{}", PREFIX, key, index)
}

/// Inverse of [`custom_id`]
pub fn parse_custom_id(id: &str) -> Option<(String, usize)> {
    let mut parts = id.splitn(3, ':');
    if parts.next()? != PREFIX {
        return None;
    }
    let key = parts.next()?.to_string();
    let index = parts.next()?.parse().ok()?;
    Some((key, index))
}

/// Previous / position / next button row for page `index` of `total`
pub fn buttons(key: &str, index: usize, total: usize) -> Value {
    let button = |label: String, target: usize, disabled: bool| {
        json!({
            "type": 2,
            "style": 2,
            "label": label,
            "custom_id": custom_id(key, target),
            "disabled": disabled,
        })
    };
    let position = json!({
        "type": 2,
        "style": 2,
        "label": format!("{}/{}", index + 1, total),
        "custom_id": format!("{}:{}:pos", PREFIX, key),
        "disabled": true,
    });
    json!([{
        "type": 1,
        "components": [
            button("<".into(), index.saturating_sub(1), index == 0),
            position,
            button(">".into(), (index + 1).min(total.saturating_sub(1)), index + 1 >= total),
        ]
    }])
}
