#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use placefinder::config::{HarvestConfig, Pacing, ScrollConfig, SessionConfig};
use placefinder::error::{HarvestError, HarvestResult};
use placefinder::session::{FeedMetrics, Identity, Page, SessionFactory};

#[derive(Debug, Clone)]
pub struct FakePlace {
    pub slug: String,
    pub name: String,
    pub url: String,
    pub category_line: String,
    pub address: String,
    pub phone: String,
    /// Extra info row shown only on the result card.
    pub card_note: String,
}

impl FakePlace {
    pub fn new(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            name: slug.replace('+', " "),
            url: format!("https://www.google.com/maps/place/{}/data=!4m7", slug),
            category_line: "Cafe".to_string(),
            address: format!("{} Tahrir Street", slug.len()),
            phone: "0223929793".to_string(),
            card_note: String::new(),
        }
    }

    pub fn without_phone(mut self) -> Self {
        self.phone.clear();
        self
    }

    pub fn with_card_note(mut self, note: &str) -> Self {
        self.card_note = note.to_string();
        self
    }
}

pub fn card_html(place: &FakePlace) -> String {
    let note = if place.card_note.is_empty() {
        String::new()
    } else {
        format!(r#"<div class="W4Efsd"><span>{}</span></div>"#, place.card_note)
    };
    format!(
        r#"<div class="Nv2PK">
  <a class="hfpxzc" href="{url}" aria-label="{name}"></a>
  <div class="W4Efsd">
    <div class="W4Efsd"><span>4.4</span><span>(120)</span></div>
    <div class="W4Efsd"><span>{category}</span><span>·</span><span>{address}</span></div>
    {note}
  </div>
</div>"#,
        url = place.url,
        name = place.name,
        category = place.category_line,
        address = place.address,
        note = note
    )
}

pub fn detail_html(place: &FakePlace) -> String {
    let phone = if place.phone.is_empty() {
        String::new()
    } else {
        format!(
            r#"<button data-item-id="phone:tel:{0}" aria-label="Phone: {0}"></button>"#,
            place.phone
        )
    };
    format!(
        r#"<div role="main">
  <h1 class="DUwDvf">{name}</h1>
  <button data-item-id="address" aria-label="Address: {address}">{address}</button>
  {phone}
  <img src="https://lh5.googleusercontent.com/p/{slug}=w408-h306">
</div>"#,
        name = place.name,
        address = place.address,
        phone = phone,
        slug = place.slug
    )
}

/// Everything the fake browser shows, shared by every session it launches.
#[derive(Default)]
pub struct World {
    /// Result feeds keyed by a word of the search query.
    pub feeds: Vec<(String, Vec<FakePlace>)>,
    /// Cards whose markup cannot be read.
    pub unreadable: HashSet<String>,
    /// Opening this card kills the session, `crashes_left` times.
    pub crash_on_open: Option<String>,
    pub crashes_left: usize,
    pub launches: usize,
    pub closes: usize,
    pub navigations: Vec<String>,
}

pub type SharedWorld = Rc<RefCell<World>>;

pub fn world(feeds: Vec<(&str, Vec<FakePlace>)>) -> SharedWorld {
    Rc::new(RefCell::new(World {
        feeds: feeds.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        ..Default::default()
    }))
}

pub struct FakeSession {
    world: SharedWorld,
    feed: Vec<FakePlace>,
    detail: Option<FakePlace>,
}

impl FakeSession {
    fn place(&self, index: usize) -> HarvestResult<FakePlace> {
        self.feed
            .get(index)
            .cloned()
            .ok_or_else(|| HarvestError::Extraction(format!("no card at {}", index)))
    }
}

impl Page for FakeSession {
    fn navigate(&mut self, url: &str) -> HarvestResult<()> {
        let world = self.world.borrow();
        self.detail = None;
        self.feed.clear();
        if url.contains("/maps/search/") {
            if let Some((_, places)) = world.feeds.iter().find(|(key, _)| url.contains(key.as_str())) {
                self.feed = places.clone();
            }
        } else {
            self.detail = world
                .feeds
                .iter()
                .flat_map(|(_, places)| places.iter())
                .find(|p| p.url == url)
                .cloned();
        }
        drop(world);
        self.world.borrow_mut().navigations.push(url.to_string());
        Ok(())
    }

    fn results_ready(&mut self) -> HarvestResult<bool> {
        Ok(!self.feed.is_empty())
    }

    fn item_count(&mut self) -> HarvestResult<usize> {
        Ok(self.feed.len())
    }

    fn feed_metrics(&mut self) -> HarvestResult<FeedMetrics> {
        Ok(FeedMetrics::default())
    }

    fn scroll_feed(&mut self, _delta: i64) -> HarvestResult<()> {
        Ok(())
    }

    fn end_marker_present(&mut self) -> HarvestResult<bool> {
        Ok(true)
    }

    fn item_html(&mut self, index: usize) -> HarvestResult<String> {
        let place = self.place(index)?;
        if self.world.borrow().unreadable.contains(&place.url) {
            return Err(HarvestError::Extraction(format!("stale card {}", index)));
        }
        Ok(card_html(&place))
    }

    fn open_item(&mut self, index: usize) -> HarvestResult<()> {
        let place = self.place(index)?;
        let mut world = self.world.borrow_mut();
        if world.crash_on_open.as_deref() == Some(place.url.as_str()) && world.crashes_left > 0 {
            world.crashes_left -= 1;
            return Err(HarvestError::Session("connection is closed".to_string()));
        }
        self.detail = Some(place);
        Ok(())
    }

    fn detail_ready(&mut self) -> HarvestResult<bool> {
        Ok(self.detail.is_some())
    }

    fn detail_html(&mut self) -> HarvestResult<String> {
        Ok(self
            .detail
            .as_ref()
            .map(detail_html)
            .unwrap_or_else(|| "<div role=\"main\"></div>".to_string()))
    }

    fn open_blank_context(&mut self) -> HarvestResult<()> {
        Ok(())
    }

    fn close(&mut self) {
        self.world.borrow_mut().closes += 1;
    }
}

pub struct FakeFactory {
    pub world: SharedWorld,
}

impl SessionFactory for FakeFactory {
    type Session = FakeSession;

    fn create(&mut self, _config: &SessionConfig, _identity: &Identity) -> HarvestResult<FakeSession> {
        self.world.borrow_mut().launches += 1;
        Ok(FakeSession {
            world: self.world.clone(),
            feed: Vec::new(),
            detail: None,
        })
    }
}

/// Production tunables with every wait and pause set to zero.
pub fn fast_config(location: &str, output: &str) -> HarvestConfig {
    HarvestConfig {
        location: location.to_string(),
        output_file: output.to_string(),
        detail_timeout: Duration::ZERO,
        session: SessionConfig {
            page_load_timeout: Duration::ZERO,
            ..Default::default()
        },
        scroll: ScrollConfig {
            step_pause_min: Duration::ZERO,
            step_pause_max: Duration::ZERO,
            poll_window_min: Duration::ZERO,
            poll_window_max: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..Default::default()
        },
        pacing: Pacing::none(),
        ..Default::default()
    }
}

pub fn places(prefix: &str, count: usize) -> Vec<FakePlace> {
    (1..=count).map(|i| FakePlace::new(&format!("{}+{}", prefix, i))).collect()
}
