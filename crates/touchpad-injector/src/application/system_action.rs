//! Three-finger swipe shortcuts and the external-command seam.
//!
//! Swipes do not move the pointer; they trigger platform navigation
//! (back, recent apps, app list, notification shade).  These are issued as
//! commands through a [`CommandRunner`] so the actual process spawning, and
//! its timeout, stay in the infrastructure layer.

use async_trait::async_trait;
use touchpad_core::{SwipeDirection, TargetId};

use crate::application::pointer_sink::InjectionError;

/// Key code of the platform "back" key.
pub const KEYCODE_BACK: u32 = 4;
/// Key code of the recent-apps / overview key.
pub const KEYCODE_APP_SWITCH: u32 = 187;
/// Key code that opens the full app list.
pub const KEYCODE_ALL_APPS: u32 = 284;

/// A platform navigation shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemAction {
    Back,
    Overview,
    AppList,
    ExpandNotifications,
}

impl From<SwipeDirection> for SystemAction {
    fn from(direction: SwipeDirection) -> Self {
        match direction {
            SwipeDirection::Left => SystemAction::Back,
            SwipeDirection::Right => SystemAction::Overview,
            SwipeDirection::Up => SystemAction::AppList,
            SwipeDirection::Down => SystemAction::ExpandNotifications,
        }
    }
}

impl SystemAction {
    /// Program and arguments that perform this action on `target`.
    ///
    /// Key events go through `input_program` scoped to the display; the
    /// notification shade is global and uses the status-bar service.
    pub fn command(self, input_program: &str, target: TargetId) -> (String, Vec<String>) {
        let key = match self {
            SystemAction::Back => KEYCODE_BACK,
            SystemAction::Overview => KEYCODE_APP_SWITCH,
            SystemAction::AppList => KEYCODE_ALL_APPS,
            SystemAction::ExpandNotifications => {
                return (
                    "cmd".to_string(),
                    vec!["statusbar".to_string(), "expand-notifications".to_string()],
                );
            }
        };
        (
            input_program.to_string(),
            vec![
                "-d".to_string(),
                target.0.to_string(),
                "keyevent".to_string(),
                key.to_string(),
            ],
        )
    }
}

/// Runs an external program to completion.
///
/// Implementations must enforce a deadline and kill the process when it is
/// exceeded, reporting [`InjectionError::Timeout`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), InjectionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swipe_directions_map_to_navigation_actions() {
        assert_eq!(SystemAction::from(SwipeDirection::Left), SystemAction::Back);
        assert_eq!(SystemAction::from(SwipeDirection::Right), SystemAction::Overview);
        assert_eq!(SystemAction::from(SwipeDirection::Up), SystemAction::AppList);
        assert_eq!(
            SystemAction::from(SwipeDirection::Down),
            SystemAction::ExpandNotifications
        );
    }

    #[test]
    fn test_back_is_a_display_scoped_keyevent() {
        let (program, args) = SystemAction::Back.command("input", TargetId(2));
        assert_eq!(program, "input");
        assert_eq!(args, vec!["-d", "2", "keyevent", "4"]);
    }

    #[test]
    fn test_notifications_use_statusbar_service() {
        let (program, args) = SystemAction::ExpandNotifications.command("input", TargetId(2));
        assert_eq!(program, "cmd");
        assert_eq!(args, vec!["statusbar", "expand-notifications"]);
    }
}
