//! Console session state machine.
//!
//! Idle shows host identity, Login collects credentials, Menu offers the host actions.
//! The controller owns every piece of mutable session state; the main loop feeds it one
//! key (or none) per tick and redraws from [`SessionController::view`].

use std::time::Instant;
use tracing::{debug, info};

use super::auth::Authenticator;
use super::menu::{MenuItem, MenuModel};
use super::timer::IdleTimer;
use crate::config::ConsoleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Login,
    Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

/// Keys the console reacts to. Everything else arrives as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    F(u8),
    Char(char),
    Esc,
    Tab,
    Up,
    Down,
    Enter,
    Backspace,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Poll timed out.
    NoKey,
    /// Key only woke a dimmed idle screen.
    Woke,
    Handled,
    Ignored,
}

pub const ACCESS_DENIED: &str = "Access Denied";

// ── Login form ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    username: String,
    password: String,
    active_field: LoginField,
    error_message: String,
}

impl LoginForm {
    pub fn new(default_username: &str) -> Self {
        Self {
            username: default_username.to_string(),
            password: String::new(),
            active_field: LoginField::Password,
            error_message: String::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Number of mask characters to draw. The password itself is never exposed.
    pub fn password_len(&self) -> usize {
        self.password.chars().count()
    }

    pub fn active_field(&self) -> LoginField {
        self.active_field
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    fn reset_secrets(&mut self) {
        self.password.clear();
        self.error_message.clear();
    }

    fn active_buffer(&mut self) -> &mut String {
        match self.active_field {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }

    fn toggle_field(&mut self) {
        self.active_field = match self.active_field {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }
}

// ── Dispatch seam ─────────────────────────────────────────────────────────────

/// Runs a menu action to completion, blocking the loop.
pub trait Dispatch {
    fn dispatch(&mut self, item: &MenuItem);
}

/// Borrowed snapshot handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub state: SessionState,
    pub dimmed: bool,
    pub login: &'a LoginForm,
    pub menu: &'a MenuModel,
}

// ── Controller ────────────────────────────────────────────────────────────────

pub struct SessionController<A: Authenticator> {
    state: SessionState,
    login: LoginForm,
    menu: MenuModel,
    timer: IdleTimer,
    auth: A,
}

impl<A: Authenticator> SessionController<A> {
    pub fn new(auth: A, config: &ConsoleConfig, now: Instant) -> Self {
        Self {
            state: SessionState::Idle,
            login: LoginForm::new(&config.default_username),
            menu: MenuModel::default(),
            timer: IdleTimer::new(now, config.screensaver_timeout()),
            auth,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn login(&self) -> &LoginForm {
        &self.login
    }

    pub fn menu(&self) -> &MenuModel {
        &self.menu
    }

    pub fn last_input(&self) -> Instant {
        self.timer.last_input()
    }

    pub fn dimmed(&self, now: Instant) -> bool {
        self.state == SessionState::Idle && self.timer.expired(now)
    }

    pub fn view(&self, now: Instant) -> SessionView<'_> {
        SessionView {
            state: self.state,
            dimmed: self.dimmed(now),
            login: &self.login,
            menu: &self.menu,
        }
    }

    /// Interprets one polled key. `None` is a poll timeout and changes nothing.
    ///
    /// `drawn_dimmed` is the dim state of the frame on screen while the key was awaited.
    /// Only a key pressed at a dimmed frame is swallowed as a wake key; `now` is when
    /// the key arrived and restarts the idle timer.
    pub fn handle_key(
        &mut self,
        key: Option<Key>,
        now: Instant,
        drawn_dimmed: bool,
        dispatcher: &mut dyn Dispatch,
    ) -> KeyOutcome {
        let Some(key) = key else {
            return KeyOutcome::NoKey;
        };

        let was_dimmed = drawn_dimmed && self.state == SessionState::Idle;
        self.timer.record_input(now);
        if was_dimmed {
            debug!("display woken");
            return KeyOutcome::Woke;
        }

        match self.state {
            SessionState::Idle => self.on_idle(key),
            SessionState::Login => self.on_login(key),
            SessionState::Menu => self.on_menu(key, dispatcher),
        }
    }

    fn on_idle(&mut self, key: Key) -> KeyOutcome {
        match key {
            Key::F(2) | Key::F(12) | Key::Char('2') => {
                self.login.reset_secrets();
                self.login.active_field = LoginField::Password;
                self.state = SessionState::Login;
                KeyOutcome::Handled
            }
            _ => KeyOutcome::Ignored,
        }
    }

    fn on_login(&mut self, key: Key) -> KeyOutcome {
        match key {
            Key::Esc => {
                self.login.reset_secrets();
                self.state = SessionState::Idle;
            }
            Key::Tab => self.login.toggle_field(),
            Key::Down => self.login.active_field = LoginField::Password,
            Key::Up => self.login.active_field = LoginField::Username,
            Key::Enter => self.submit_login(),
            Key::Backspace => {
                self.login.active_buffer().pop();
            }
            Key::Char(c) if (' '..='~').contains(&c) => self.login.active_buffer().push(c),
            _ => return KeyOutcome::Ignored,
        }
        KeyOutcome::Handled
    }

    fn submit_login(&mut self) {
        let password = std::mem::take(&mut self.login.password);
        let accepted = self.auth.verify(&self.login.username, &password);
        drop(password);

        if accepted {
            info!(user = %self.login.username, "console session opened");
            self.login.error_message.clear();
            self.menu.reset();
            self.state = SessionState::Menu;
        } else {
            self.login.error_message = ACCESS_DENIED.to_string();
        }
    }

    fn on_menu(&mut self, key: Key, dispatcher: &mut dyn Dispatch) -> KeyOutcome {
        match key {
            Key::Up => self.menu.up(),
            Key::Down => self.menu.down(),
            Key::Esc => {
                info!("console session closed");
                self.state = SessionState::Idle;
            }
            Key::Enter => {
                if let Some(item) = self.menu.selected_item() {
                    dispatcher.dispatch(item);
                    self.timer.record_input(Instant::now());
                }
            }
            _ => return KeyOutcome::Ignored,
        }
        KeyOutcome::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::{AuthError, AuthenticationService, Credentials, TicketIssuer};
    use crate::core::menu::MenuAction;
    use crate::core::shadow::{CredentialLookup, HashScheme};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::time::Duration;

    struct FakeAuth {
        accept: Option<(&'static str, &'static str)>,
        attempts: RefCell<Vec<(String, String)>>,
    }

    impl FakeAuth {
        fn rejecting() -> Self {
            Self {
                accept: None,
                attempts: RefCell::new(Vec::new()),
            }
        }

        fn accepting(user: &'static str, pass: &'static str) -> Self {
            Self {
                accept: Some((user, pass)),
                attempts: RefCell::new(Vec::new()),
            }
        }
    }

    impl Authenticator for FakeAuth {
        fn verify(&self, username: &str, password: &str) -> bool {
            self.attempts
                .borrow_mut()
                .push((username.to_string(), password.to_string()));
            self.accept
                .is_some_and(|(u, p)| u == username && p == password)
        }
    }

    #[derive(Default)]
    struct RecordingDispatch(Vec<MenuAction>);

    impl Dispatch for RecordingDispatch {
        fn dispatch(&mut self, item: &MenuItem) {
            self.0.push(item.action);
        }
    }

    fn controller<A: Authenticator>(auth: A) -> (SessionController<A>, Instant) {
        let t0 = Instant::now();
        (SessionController::new(auth, &ConsoleConfig::default(), t0), t0)
    }

    fn press<A: Authenticator>(
        c: &mut SessionController<A>,
        keys: &[Key],
        now: Instant,
    ) -> RecordingDispatch {
        let mut d = RecordingDispatch::default();
        for k in keys {
            let drawn_dimmed = c.dimmed(now);
            c.handle_key(Some(*k), now, drawn_dimmed, &mut d);
        }
        d
    }

    fn type_str<A: Authenticator>(c: &mut SessionController<A>, s: &str, now: Instant) {
        let keys: Vec<Key> = s.chars().map(Key::Char).collect();
        press(c, &keys, now);
    }

    fn to_menu(c: &mut SessionController<FakeAuth>, now: Instant) {
        press(c, &[Key::F(2)], now);
        type_str(c, "secret", now);
        press(c, &[Key::Enter], now);
        assert_eq!(c.state(), SessionState::Menu);
    }

    #[test]
    fn starts_idle_with_default_username() {
        let (c, t0) = controller(FakeAuth::rejecting());
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.login().username(), "root");
        assert!(!c.dimmed(t0));
    }

    #[test]
    fn f2_f12_and_digit_two_open_login_on_password_field() {
        for key in [Key::F(2), Key::F(12), Key::Char('2')] {
            let (mut c, t0) = controller(FakeAuth::rejecting());
            press(&mut c, &[key], t0);
            assert_eq!(c.state(), SessionState::Login);
            assert_eq!(c.login().active_field(), LoginField::Password);
            assert_eq!(c.login().password_len(), 0);
            assert_eq!(c.login().error_message(), "");
        }
    }

    #[test]
    fn poll_timeout_is_a_no_op() {
        let (mut c, t0) = controller(FakeAuth::rejecting());
        let later = t0 + Duration::from_secs(30);
        let out = c.handle_key(None, later, false, &mut RecordingDispatch::default());
        assert_eq!(out, KeyOutcome::NoKey);
        assert_eq!(c.last_input(), t0);
    }

    #[test]
    fn dims_only_after_timeout_and_only_when_idle() {
        let (mut c, t0) = controller(FakeAuth::rejecting());
        assert!(!c.dimmed(t0 + Duration::from_secs(59)));
        assert!(c.dimmed(t0 + Duration::from_secs(61)));

        press(&mut c, &[Key::F(2)], t0);
        assert!(!c.dimmed(t0 + Duration::from_secs(600)));
    }

    #[test]
    fn key_on_dimmed_screen_only_wakes() {
        let (mut c, t0) = controller(FakeAuth::rejecting());
        let later = t0 + Duration::from_secs(120);
        let drawn_dimmed = c.view(later).dimmed;
        let out = c.handle_key(Some(Key::F(2)), later, drawn_dimmed, &mut RecordingDispatch::default());
        assert_eq!(out, KeyOutcome::Woke);
        assert_eq!(c.state(), SessionState::Idle);
        assert!(!c.dimmed(later));
        assert_eq!(c.last_input(), later);

        press(&mut c, &[Key::F(2)], later);
        assert_eq!(c.state(), SessionState::Login);
    }

    #[test]
    fn key_arriving_after_timeout_acts_when_frame_was_bright() {
        let (mut c, t0) = controller(FakeAuth::rejecting());
        let drawn_at = t0 + Duration::from_millis(59_500);
        let pressed_at = t0 + Duration::from_millis(60_300);
        let drawn_dimmed = c.view(drawn_at).dimmed;
        assert!(!drawn_dimmed);
        assert!(c.dimmed(pressed_at));

        let out = c.handle_key(Some(Key::F(2)), pressed_at, drawn_dimmed, &mut RecordingDispatch::default());
        assert_eq!(out, KeyOutcome::Handled);
        assert_eq!(c.state(), SessionState::Login);
        assert_eq!(c.last_input(), pressed_at);
    }

    #[test]
    fn stale_dimmed_flag_is_ignored_outside_idle() {
        let (mut c, t0) = controller(FakeAuth::rejecting());
        press(&mut c, &[Key::F(2)], t0);
        let out = c.handle_key(Some(Key::Esc), t0, true, &mut RecordingDispatch::default());
        assert_eq!(out, KeyOutcome::Handled);
        assert_eq!(c.state(), SessionState::Idle);
    }

    #[test]
    fn unlisted_idle_keys_still_reset_timer() {
        let (mut c, t0) = controller(FakeAuth::rejecting());
        let later = t0 + Duration::from_secs(30);
        let out = c.handle_key(Some(Key::Esc), later, false, &mut RecordingDispatch::default());
        assert_eq!(out, KeyOutcome::Ignored);
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.last_input(), later);
    }

    #[test]
    fn login_field_editing() {
        let (mut c, t0) = controller(FakeAuth::rejecting());
        press(&mut c, &[Key::F(2), Key::Up], t0);
        assert_eq!(c.login().active_field(), LoginField::Username);

        for _ in 0..4 {
            press(&mut c, &[Key::Backspace], t0);
        }
        assert_eq!(c.login().username(), "");
        press(&mut c, &[Key::Backspace], t0);
        assert_eq!(c.login().username(), "");

        type_str(&mut c, "root", t0);
        assert_eq!(c.login().username(), "root");

        press(&mut c, &[Key::Tab], t0);
        assert_eq!(c.login().active_field(), LoginField::Password);
        type_str(&mut c, "abc", t0);
        press(&mut c, &[Key::Backspace], t0);
        assert_eq!(c.login().password_len(), 2);
        assert_eq!(c.login().username(), "root");

        press(&mut c, &[Key::Tab, Key::Down], t0);
        assert_eq!(c.login().active_field(), LoginField::Password);
    }

    #[test]
    fn non_printable_and_non_ascii_chars_are_ignored_in_login() {
        let (mut c, t0) = controller(FakeAuth::rejecting());
        press(&mut c, &[Key::F(2)], t0);
        let before = c.login().clone();
        let mut d = RecordingDispatch::default();
        for key in [Key::Char('é'), Key::Char('\u{7}'), Key::F(5), Key::Other] {
            assert_eq!(c.handle_key(Some(key), t0, false, &mut d), KeyOutcome::Ignored);
        }
        assert_eq!(c.login(), &before);
        assert_eq!(c.state(), SessionState::Login);
    }

    #[test]
    fn wrong_password_sets_error_and_clears_buffer() {
        let (mut c, t0) = controller(FakeAuth::rejecting());
        press(&mut c, &[Key::F(2)], t0);
        type_str(&mut c, "wrongpass", t0);
        press(&mut c, &[Key::Enter], t0);

        assert_eq!(c.state(), SessionState::Login);
        assert_eq!(c.login().error_message(), ACCESS_DENIED);
        assert_eq!(c.login().password_len(), 0);
        assert_eq!(
            *c.auth.attempts.borrow(),
            vec![("root".to_string(), "wrongpass".to_string())]
        );
    }

    #[test]
    fn reopening_login_clears_previous_error() {
        let (mut c, t0) = controller(FakeAuth::rejecting());
        press(&mut c, &[Key::F(2), Key::Enter, Key::Esc], t0);
        assert_eq!(c.state(), SessionState::Idle);
        press(&mut c, &[Key::F(2)], t0);
        assert_eq!(c.login().error_message(), "");
    }

    #[test]
    fn successful_login_enters_menu_at_first_item() {
        let (mut c, t0) = controller(FakeAuth::accepting("root", "secret"));
        to_menu(&mut c, t0);
        assert_eq!(c.menu().selected(), 0);
        assert_eq!(c.login().password_len(), 0);
    }

    #[test]
    fn menu_navigation_clamps_and_escape_logs_out() {
        let (mut c, t0) = controller(FakeAuth::accepting("root", "secret"));
        to_menu(&mut c, t0);
        press(&mut c, &[Key::Down; 6], t0);
        assert_eq!(c.menu().selected(), 6);
        press(&mut c, &[Key::Down], t0);
        assert_eq!(c.menu().selected(), 6);

        press(&mut c, &[Key::Esc], t0);
        assert_eq!(c.state(), SessionState::Idle);
    }

    #[test]
    fn menu_enter_dispatches_selected_item_and_stays_in_menu() {
        let (mut c, t0) = controller(FakeAuth::accepting("root", "secret"));
        to_menu(&mut c, t0);
        let d = press(&mut c, &[Key::Down, Key::Down, Key::Enter], t0);
        assert_eq!(d.0, vec![MenuAction::TestNetwork]);
        assert_eq!(c.state(), SessionState::Menu);
        assert!(c.last_input() >= t0);
    }

    #[test]
    fn menu_ignores_unlisted_keys() {
        let (mut c, t0) = controller(FakeAuth::accepting("root", "secret"));
        to_menu(&mut c, t0);
        let before = c.menu().clone();
        let d = press(&mut c, &[Key::Tab, Key::Char('x'), Key::Backspace, Key::F(2)], t0);
        assert!(d.0.is_empty());
        assert_eq!(c.menu(), &before);
        assert_eq!(c.state(), SessionState::Menu);
    }

    // ── With the real two-tier service ───────────────────────────────────────

    struct DownEndpoint;

    impl TicketIssuer for DownEndpoint {
        fn request_ticket(&self, _: Credentials<'_>) -> Result<(), AuthError> {
            Err(AuthError::ServiceUnavailable("connection refused".into()))
        }
    }

    struct OneUser(&'static str, &'static str);

    impl CredentialLookup for OneUser {
        fn password_hash(&self, username: &str) -> Result<String, AuthError> {
            if username == self.0 {
                Ok(self.1.to_string())
            } else {
                Err(AuthError::LookupFailure("missing".into()))
            }
        }

        fn name(&self) -> &'static str {
            "one-user"
        }
    }

    struct PlainScheme;

    impl HashScheme for PlainScheme {
        fn hash(&self, password: &str, _setting: &str) -> Result<String, AuthError> {
            Ok(format!("plain:{password}"))
        }
    }

    fn real_service(store: OneUser) -> AuthenticationService {
        AuthenticationService::new(
            Some(Box::new(DownEndpoint)),
            Box::new(store),
            Box::new(PlainScheme),
        )
    }

    #[test]
    fn local_tier_admits_root_when_endpoint_is_down() {
        let (mut c, t0) = controller(real_service(OneUser("root", "plain:toor")));
        press(&mut c, &[Key::F(2)], t0);
        type_str(&mut c, "toor", t0);
        press(&mut c, &[Key::Enter], t0);
        assert_eq!(c.state(), SessionState::Menu);
        assert_eq!(c.menu().selected(), 0);
    }

    #[test]
    fn locked_account_is_denied_when_endpoint_is_down() {
        let (mut c, t0) = controller(real_service(OneUser("root", "!")));
        press(&mut c, &[Key::F(2)], t0);
        type_str(&mut c, "wrongpass", t0);
        press(&mut c, &[Key::Enter], t0);
        assert_eq!(c.state(), SessionState::Login);
        assert_eq!(c.login().error_message(), ACCESS_DENIED);
        assert_eq!(c.login().password_len(), 0);
    }
}
