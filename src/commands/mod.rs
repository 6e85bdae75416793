pub(crate) mod download;
pub(crate) mod init;
pub(crate) mod logs;
pub(crate) mod start;
pub(crate) mod status;
pub(crate) mod stop;

use console::style;

pub(crate) const SUCCESS_PREFIX: &str = "✓";
pub(crate) const INFO_PREFIX: &str = "→";
pub(crate) const WARNING_PREFIX: &str = "!";

pub(crate) fn print_success(msg: impl std::fmt::Display) {
    println!("{} {}", style(SUCCESS_PREFIX).green().bold(), msg);
}

pub(crate) fn print_info(msg: impl std::fmt::Display) {
    println!("{} {}", style(INFO_PREFIX).cyan(), msg);
}

pub(crate) fn print_warning(msg: impl std::fmt::Display) {
    println!("{} {}", style(WARNING_PREFIX).yellow(), msg);
}
