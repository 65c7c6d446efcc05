//! Fatal error reporting for the player.

use miette::{Diagnostic, Report};
use tracing::error;

pub const FAILURE_EXIT_CODE: i32 = 1;

/// Renders `err` with its code, help and source chain.
pub fn render<E>(err: E) -> String
where
    E: Diagnostic + Send + Sync + 'static,
{
    format!("{:?}", Report::new(err))
}

/// Prints the diagnostic to standard output, shows it in a message box when
/// the `native-dialog` feature is on, and exits with status 1.
pub fn abort<E>(err: E) -> !
where
    E: Diagnostic + Send + Sync + 'static,
{
    error!(error = %err, "fatal error");
    let message = render(err);
    println!("{message}");
    show_dialog(&message);
    std::process::exit(FAILURE_EXIT_CODE)
}

#[cfg(feature = "native-dialog")]
fn show_dialog(message: &str) {
    let _ = rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title("Fatal error")
        .set_description(message)
        .set_buttons(rfd::MessageButtons::Ok)
        .show();
}

#[cfg(not(feature = "native-dialog"))]
fn show_dialog(_message: &str) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuntimeError;

    #[test]
    fn render_includes_code_and_help() {
        let rendered = render(RuntimeError::NoSceneToLoad);
        assert!(rendered.contains("no scene to load"));
        assert!(rendered.contains("gd.no_scene"));
        assert!(rendered.contains("at least one scene"));
    }
}
