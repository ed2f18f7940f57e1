//! Non-fatal diagnostics collected while decoding.
//!
//! Lenient recoveries (a checksum that does not match, a skipped record of
//! an unknown type) are recorded here instead of aborting the read. Each
//! notification is also emitted as a `tracing` event at the matching level.

use std::fmt;

/// Category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    /// A record or section kind that has no decoder.
    NotImplemented,
    /// Feature exists but is not supported in this context.
    NotSupported,
    /// Recovered integrity problem.
    Warning,
    /// Error that was recovered from.
    Error,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotImplemented => write!(f, "NotImplemented"),
            Self::NotSupported => write!(f, "NotSupported"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// A single notification, optionally located in a section.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub notification_type: NotificationType,
    pub message: String,
    /// Section being decoded when the notification was raised.
    pub section: Option<String>,
    /// Byte offset within that section.
    pub offset: Option<u64>,
}

impl Notification {
    pub fn new(notification_type: NotificationType, message: impl Into<String>) -> Self {
        Self {
            notification_type,
            message: message.into(),
            section: None,
            offset: None,
        }
    }

    /// Attach the section and offset the notification refers to.
    pub fn at(mut self, section: &str, offset: u64) -> Self {
        self.section = Some(section.to_string());
        self.offset = Some(offset);
        self
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.notification_type)?;
        if let Some(section) = &self.section {
            write!(f, "{}", section)?;
            if let Some(offset) = self.offset {
                write!(f, "@{:#X}", offset)?;
            }
            write!(f, ": ")?;
        }
        write!(f, "{}", self.message)
    }
}

/// Collects notifications during a read or write.
#[derive(Debug, Clone, Default)]
pub struct NotificationCollection {
    items: Vec<Notification>,
}

impl NotificationCollection {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Record a notification without location.
    pub fn notify(&mut self, notification_type: NotificationType, message: impl Into<String>) {
        self.push(Notification::new(notification_type, message));
    }

    /// Record a notification raised at `offset` inside `section`.
    pub fn notify_at(
        &mut self,
        notification_type: NotificationType,
        section: &str,
        offset: u64,
        message: impl Into<String>,
    ) {
        self.push(Notification::new(notification_type, message).at(section, offset));
    }

    /// Record an already built notification.
    pub fn push(&mut self, notification: Notification) {
        match notification.notification_type {
            NotificationType::Error => tracing::error!("{}", notification),
            NotificationType::Warning => tracing::warn!("{}", notification),
            NotificationType::NotImplemented | NotificationType::NotSupported => {
                tracing::info!("{}", notification)
            }
        }
        self.items.push(notification);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Notification> {
        self.items.iter()
    }

    /// Get all notifications of a specific type.
    pub fn of_type(&self, nt: NotificationType) -> Vec<&Notification> {
        self.items.iter().filter(|n| n.notification_type == nt).collect()
    }

    /// Check whether any notification of the given type exists.
    pub fn has_type(&self, nt: NotificationType) -> bool {
        self.items.iter().any(|n| n.notification_type == nt)
    }

    /// Move all notifications of `other` into this collection.
    pub fn extend(&mut self, other: NotificationCollection) {
        self.items.extend(other.items);
    }

    pub fn into_vec(self) -> Vec<Notification> {
        self.items
    }
}

impl IntoIterator for NotificationCollection {
    type Item = Notification;
    type IntoIter = std::vec::IntoIter<Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a NotificationCollection {
    type Item = &'a Notification;
    type IntoIter = std::slice::Iter<'a, Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_basics() {
        let mut c = NotificationCollection::new();
        assert!(c.is_empty());

        c.notify(NotificationType::Warning, "w1");
        c.notify(NotificationType::Error, "e1");
        c.notify_at(NotificationType::Warning, "AcDb:Classes", 0x10, "w2");

        assert_eq!(c.len(), 3);
        assert_eq!(c.of_type(NotificationType::Warning).len(), 2);
        assert!(c.has_type(NotificationType::Error));
        assert!(!c.has_type(NotificationType::NotImplemented));
    }

    #[test]
    fn test_display_with_location() {
        let n = Notification::new(NotificationType::NotImplemented, "record type 0x1F4 skipped")
            .at("AcDb:AcDbObjects", 0x2A);
        assert_eq!(
            format!("{}", n),
            "[NotImplemented] AcDb:AcDbObjects@0x2A: record type 0x1F4 skipped"
        );
    }

    #[test]
    fn test_display_without_location() {
        let n = Notification::new(NotificationType::Warning, "crc mismatch");
        assert_eq!(format!("{}", n), "[Warning] crc mismatch");
    }
}
