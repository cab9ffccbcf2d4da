#[cfg(test)]
mod tests {
    use crate::error::*;
    use nix::errno::Errno;
    use nix::sys::signal::Signal;
    use schema::ChildId;
    use std::error::Error;
    use std::io;

    fn child(raw: i32) -> ChildId {
        ChildId::new(raw).expect("positive pid")
    }

    #[test]
    fn test_core_error_display() {
        let err = CoreError::ValidationError("test validation".to_string());
        assert_eq!(err.to_string(), "Validation error: test validation");

        let err = CoreError::ConfigurationError("bad config".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad config");

        let err = CoreError::from(WaitError::EmptyTable);
        assert_eq!(err.to_string(), "Wait error: no tracked children to reap");
    }

    #[test]
    fn test_wait_error_display() {
        let err = WaitError::MissedReap { tracked: 2 };
        assert_eq!(
            err.to_string(),
            "waitpid reported no children while 2 remain tracked"
        );

        let err = WaitError::UnknownChild(child(4242));
        assert_eq!(err.to_string(), "child 4242 is not tracked by this supervisor");

        let err = WaitError::Platform {
            syscall: "waitpid",
            errno: Errno::EINVAL,
        };
        assert!(err.to_string().starts_with("waitpid failed: EINVAL"));
    }

    #[test]
    fn test_signal_error_display() {
        let err = SignalError::Failed {
            id: child(10),
            signal: Signal::SIGKILL,
            errno: Errno::EPERM,
        };
        assert!(err.to_string().starts_with("failed to send SIGKILL to child 10: EPERM"));
    }

    #[test]
    fn test_logic_errors_are_distinct_from_platform_errors() {
        assert!(WaitError::EmptyTable.is_logic_error());
        assert!(WaitError::MissedReap { tracked: 1 }.is_logic_error());
        assert!(!WaitError::Platform {
            syscall: "waitpid",
            errno: Errno::EINVAL
        }
        .is_logic_error());
        assert!(!WaitError::Interrupted { attempts: 3 }.is_logic_error());
    }

    #[test]
    fn test_core_error_from_std_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();

        if let CoreError::IoError(_) = core_err {
            // Expected variant
        } else {
            panic!("Expected CoreError::IoError variant");
        }
    }

    #[test]
    fn test_core_error_source_chain() {
        let err = CoreError::from(SpawnError::ForkFailed {
            syscall: "fork",
            errno: Errno::ENOMEM,
        });
        // thiserror forwards #[from] fields as the source
        assert!(err.source().is_some());

        let err = CoreError::ValidationError("test".to_string());
        assert!(err.source().is_none());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SpawnError::ForkFailed {
                syscall: "pipe2",
                errno: Errno::EMFILE
            }
            .code(),
            "SPAWN001"
        );
        assert_eq!(
            SpawnError::ExecFailed {
                errno: Errno::ENOENT
            }
            .code(),
            "SPAWN002"
        );
        assert_eq!(WaitError::MissedReap { tracked: 1 }.code(), "WAIT002");
        assert_eq!(WaitError::UnknownChild(child(1)).code(), "WAIT003");
        assert_eq!(WaitError::Interrupted { attempts: 1 }.code(), "WAIT004");
        assert_eq!(
            SignalError::UnknownChild(child(1)).code(),
            "SIGNAL001"
        );
        assert_eq!(
            CoreError::InitializationError("test".to_string()).code(),
            "CORE003"
        );
    }
}
