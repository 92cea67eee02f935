//! Session management
//!
//! A session is one execution of an executable. Each session gets its own directory under the
//! software root containing the log file and any data saved during the run.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use erased_serde::Serialize;
use log::{info, warn};
use std::fs;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};
use thiserror::Error;

// Internal imports
use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// A chrono format string which diplays a timestamp. See
/// https://docs.rs/chrono/0.4.11/chrono/format/strftime/index.html for more
/// information.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A struct storing information about the current session
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,

    save_sender: Sender<SaveMsg>,

    save_handle: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The software root environment variable ({}) is not set", crate::host::SW_ROOT_ENV_VAR)]
    SwRootNotSet,

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error(
        "Cannot initialise the session epoch, have you already initialised the\
         session? (conquer_once error: {0})"
    )]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("Cannot get the epoch time, did you forget to initialise the session?")]
    CannotGetEpoch,
}

/// Messages handled by the background save thread.
enum SaveMsg {
    Save(PathBuf, Box<dyn Serialize + Send>),
    Stop,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session within the given directory.
    ///
    /// This will create a new session directory named `{exec_name}_{timestamp}`
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        // Set the session epoch
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;

        // Format the session epoch as a timestamp
        let timestamp = match SESSION_EPOCH.get() {
            Some(e) => e.format(TIMESTAMP_FORMAT),
            None => return Err(SessionError::CannotGetEpoch),
        };

        // Get the root directory
        let root = crate::host::get_sw_root().map_err(|_| SessionError::SwRootNotSet)?;

        // Create the session path
        let mut path: PathBuf = root;
        path.push(sessions_dir);
        path.push(format!("{}_{}", exec_name, timestamp));

        fs::create_dir_all(&path).map_err(SessionError::CannotCreateDir)?;

        // Create the log file path
        let log_file_path = path.join(format!("{}.log", exec_name));

        // Spawn the background save thread
        let (tx, rx) = channel();
        let session_root = path.clone();
        let save_handle = thread::spawn(move || save_thread(session_root, rx));

        Ok(Session {
            session_root: path,
            log_file_path,
            save_sender: tx,
            save_handle: Some(save_handle),
        })
    }

    /// Exit the session, waiting for the save thread to finish any pending actions
    pub fn exit(mut self) {
        info!("Stopping save thread");

        // Pending saves are queued ahead of the stop message so they are all written
        self.save_sender.send(SaveMsg::Stop).ok();

        if let Some(handle) = self.save_handle.take() {
            if handle.join().is_err() {
                warn!("Save thread panicked");
            }
        }

        info!("Save thread exited");
    }

    /// Saves the given data to the given session-relative path in a background thread.
    ///
    /// Only `.json` paths are currently supported.
    pub fn save<P: AsRef<Path>, T: Serialize + Send + 'static>(&self, path: P, data: T) {
        if let Err(e) = self
            .save_sender
            .send(SaveMsg::Save(path.as_ref().to_path_buf(), Box::new(data)))
        {
            warn!(
                "Could not send data to be saved to path {:?}: {}",
                path.as_ref(),
                e
            )
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the start of the session.
///
/// Returns `0.0` if no session has been started yet, so that logging from tests or from early
/// startup does not panic.
pub fn get_elapsed_seconds() -> f64 {
    match SESSION_EPOCH.get() {
        Some(e) => {
            let elapsed = Utc::now() - *e;
            time::duration_to_seconds(elapsed).unwrap_or(std::f64::NAN)
        }
        None => 0.0,
    }
}

/// Return a reference to the session's epoch.
///
/// The epoch is set when the first [`Session`] is created.
pub fn get_epoch() -> Result<&'static DateTime<Utc>, SessionError> {
    SESSION_EPOCH.get().ok_or(SessionError::CannotGetEpoch)
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn save_thread(session_root: PathBuf, receiver: Receiver<SaveMsg>) {
    while let Ok(msg) = receiver.recv() {
        let (path, data) = match msg {
            SaveMsg::Save(p, d) => (p, d),
            SaveMsg::Stop => break,
        };

        let full_path = session_root.join(path);
        match full_path.extension().and_then(|s| s.to_str()) {
            Some("json") => {
                // Create the parent path if needed
                if let Some(parent) = full_path.parent() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        warn!("Couldn't create parent directory for {:?}: {}", full_path, e);
                        continue;
                    }
                }

                let file = match OpenOptions::new()
                    .write(true)
                    .truncate(true)
                    .create(true)
                    .open(&full_path)
                {
                    Ok(f) => f,
                    Err(e) => {
                        warn!("Couldn't create file {:?}: {}", full_path, e);
                        continue;
                    }
                };

                if let Err(e) = serde_json::to_writer_pretty(&file, &data) {
                    warn!("Couldn't serialize data for file {:?}: {}", full_path, e);
                }
            }
            ext => warn!(
                "Unrecognised file path extension for {:?} (got {:?})",
                full_path, ext
            ),
        }
    }
}
