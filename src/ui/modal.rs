/// Open/closed state of a dialog together with what it shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Modal<T> {
    #[default]
    Closed,
    Open(T),
}

impl<T> Modal<T> {
    pub fn open(&mut self, payload: T) {
        *self = Modal::Open(payload);
    }

    /// Closes the dialog and hands back what it was showing.
    pub fn close(&mut self) -> Option<T> {
        match std::mem::take(self) {
            Modal::Open(payload) => Some(payload),
            Modal::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Modal::Open(_))
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Modal::Open(payload) => Some(payload),
            Modal::Closed => None,
        }
    }

    pub fn payload_mut(&mut self) -> Option<&mut T> {
        match self {
            Modal::Open(payload) => Some(payload),
            Modal::Closed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_close_cycle() {
        let mut modal: Modal<&str> = Modal::default();
        assert!(!modal.is_open());
        assert_eq!(modal.close(), None);

        modal.open("size guide");
        assert_eq!(modal.payload(), Some(&"size guide"));

        modal.open("reviews");
        assert_eq!(modal.close(), Some("reviews"));
        assert_eq!(modal, Modal::Closed);
    }
}
