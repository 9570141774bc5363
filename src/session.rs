use crate::persistence::{SESSION_SLOT_KEY, SessionStorage};
use crate::store::DataStore;
use crate::user::User;
use tracing::{debug, info, warn};

/// The single signed-in identity of a running instance.
///
/// Every change to the current user is mirrored into the session slot of the
/// attached storage. Mirroring is best-effort: a failed write is logged and
/// the in-memory change stands.
pub struct Session {
    current: Option<User>,
    storage: Box<dyn SessionStorage>,
}

impl Session {
    pub fn new(storage: Box<dyn SessionStorage>) -> Self {
        Self {
            current: None,
            storage,
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    pub fn storage(&self) -> &dyn SessionStorage {
        self.storage.as_ref()
    }

    /// Reads the persisted slot and signs the user back in. Missing,
    /// unreadable or unknown records leave the session signed out.
    pub fn restore(&mut self, store: &mut DataStore) -> Option<&User> {
        let raw = match self.storage.read_slot(SESSION_SLOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "failed to read stored session");
                return None;
            }
        };
        let persisted: User = match serde_json::from_str(&raw) {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "failed to parse stored user");
                return None;
            }
        };

        let restored = store.reconcile_user(&persisted)?.clone();
        info!(user_id = %restored.id, role = %restored.role, "session restored");
        self.current = Some(restored);
        self.current.as_ref()
    }

    /// Signs in the user owning `email`. Unknown emails change nothing.
    pub fn login(&mut self, store: &DataStore, email: &str) -> Option<&User> {
        let Some(user) = store.find_user_by_email(email) else {
            debug!(email, "login ignored for unknown email");
            return None;
        };
        info!(user_id = %user.id, role = %user.role, "signed in");
        self.set_current(user.clone());
        self.current.as_ref()
    }

    pub fn logout(&mut self) {
        if let Some(user) = self.current.take() {
            info!(user_id = %user.id, "signed out");
        }
        if let Err(err) = self.storage.remove_slot(SESSION_SLOT_KEY) {
            warn!(error = %err, "failed to clear stored session");
        }
    }

    /// Links the signed-in student to the teacher owning `invite_code`.
    /// Fails when nobody is signed in, the user is not a student, or the code
    /// matches no teacher.
    pub fn link_to_teacher(&mut self, store: &mut DataStore, invite_code: &str) -> bool {
        let Some(current) = self.current.as_ref().filter(|u| u.is_student()) else {
            return false;
        };
        match store.link_student(&current.id, invite_code) {
            Ok(updated) => {
                let updated = updated.clone();
                self.set_current(updated);
                true
            }
            Err(err) => {
                debug!(error = %err, "link rejected");
                false
            }
        }
    }

    /// Clears the signed-in student's teacher. No-op for anyone else.
    pub fn unlink_from_teacher(&mut self, store: &mut DataStore) {
        let Some(current) = self.current.as_ref().filter(|u| u.is_student()) else {
            return;
        };
        match store.unlink_student(&current.id) {
            Ok(updated) => {
                let updated = updated.clone();
                self.set_current(updated);
            }
            Err(err) => debug!(error = %err, "unlink rejected"),
        }
    }

    fn set_current(&mut self, user: User) {
        match serde_json::to_string(&user) {
            Ok(json) => {
                if let Err(err) = self.storage.write_slot(SESSION_SLOT_KEY, &json) {
                    warn!(error = %err, "failed to persist session");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialise session"),
        }
        self.current = Some(user);
    }
}
