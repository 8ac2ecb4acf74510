use chrono::{DateTime, Utc};

use crate::catalog::{FilterPatch, FilterState, Product, ProductPage, apply_filters};
use crate::chat::{ConnectionState, Delivery, TranscriptEntry};
use crate::common::{ChatEvent, SenderType};
use crate::error::{ClientError, GeolocationError};
use crate::store::{Store, StoreAction};

use super::modal::Modal;

const MAX_NOTIFICATIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

/// Transient message shown to the user.
#[derive(Debug, Clone)]
pub struct Notification {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
}

/// Which part of the app raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Storefront,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Storefront,
    AdminLogin,
    AdminDashboard,
}

/// Review form opened for one size of one product.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDraft {
    pub product_id: String,
    pub variant_id: String,
    pub size_variant_id: String,
    pub rating: u8,
    pub comment: String,
}

/// Local view state.
pub struct AppState {
    pub route: Route,
    pub store: Store,
    pub products: Vec<Product>,
    pub total_pages: u32,
    pub current_page: u32,
    filter: FilterState,
    pub review_modal: Modal<ReviewDraft>,
    pub transcript: Vec<TranscriptEntry>,
    pub connection: ConnectionState,
    pub chat_id: Option<String>,
    pub chat_unavailable: bool,
    pub notifications: Vec<Notification>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            route: Route::Storefront,
            store: Store::new(),
            products: Vec::new(),
            total_pages: 0,
            current_page: 0,
            filter: FilterState::default(),
            review_modal: Modal::Closed,
            transcript: Vec::new(),
            connection: ConnectionState::Disconnected,
            chat_id: None,
            chat_unavailable: false,
            notifications: Vec::new(),
        }
    }

    // ========== Catalog ==========

    pub fn set_page(&mut self, page: ProductPage) {
        self.total_pages = page.total_pages;
        self.current_page = page.current_page;
        self.products = page.products;
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn update_filter(&mut self, patch: FilterPatch) {
        self.filter.update(patch);
    }

    pub fn visible_products(&self) -> Vec<Product> {
        apply_filters(&self.products, &self.filter)
    }

    pub fn dispatch(&mut self, action: StoreAction) {
        let slice = self.store.dispatch(action);
        log::debug!("Store slice {slice:?} updated");
    }

    // ========== Chat ==========

    pub fn apply_chat_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::TranscriptUpdated(entries) => self.transcript = entries,
            ChatEvent::ConnectionChanged(state) => {
                self.connection = state;
                if state == ConnectionState::Connected {
                    self.chat_unavailable = false;
                }
            }
            ChatEvent::SessionAssigned(chat_id) => self.chat_id = Some(chat_id),
            ChatEvent::Unavailable { attempts } => {
                self.chat_unavailable = true;
                self.report_error(Surface::Storefront, &ClientError::Unavailable { attempts });
            }
            ChatEvent::Notice(message) => self.notify(Level::Error, message),
        }
    }

    pub fn unread_from(&self, sender: SenderType) -> usize {
        self.transcript
            .iter()
            .filter(|entry| entry.message.sender_type == sender && !entry.message.read)
            .count()
    }

    pub fn failed_sends(&self) -> usize {
        self.transcript
            .iter()
            .filter(|entry| entry.delivery == Delivery::Failed)
            .count()
    }

    // ========== Errors ==========

    /// Turns a failed operation into a notification; a 401 on the admin surface
    /// sends the user back to the admin login.
    pub fn report_error(&mut self, surface: Surface, err: &ClientError) {
        if surface == Surface::Admin && err.is_unauthorized() {
            self.route = Route::AdminLogin;
            self.notify(Level::Error, "Your admin session has expired. Please log in again.");
            return;
        }
        if err.is_unauthorized() {
            self.notify(Level::Error, "Please log in to continue.");
            return;
        }
        self.notify(Level::Error, err.to_string());
    }

    pub fn report_geolocation_error(&mut self, err: GeolocationError) {
        self.notify(Level::Error, err.user_message());
    }

    pub fn notify(&mut self, level: Level, message: impl Into<String>) {
        self.notifications.push(Notification {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        });

        if self.notifications.len() > MAX_NOTIFICATIONS {
            self.notifications.remove(0);
        }
    }

    pub fn last_notification(&self) -> Option<&Notification> {
        self.notifications.last()
    }
}
