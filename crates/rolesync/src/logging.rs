//! Log output.
//!
//! Change lines keep their `rolesync::change` target so they stand out from
//! diagnostics. Everything else is printed without a target.

use tracing::{Level, Subscriber};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

use crate::sync::CHANGE_TARGET;

/// Builds the subscriber writing events up to `level` to `writer`.
#[must_use]
pub fn subscriber<W>(level: Level, writer: W, ansi: bool) -> impl Subscriber + Send + Sync
where
    W: for<'a> MakeWriter<'a> + Clone + Send + Sync + 'static,
{
    let changes = fmt::layer()
        .with_writer(writer.clone())
        .with_ansi(ansi)
        .without_time()
        .with_filter(filter_fn(move |meta| {
            meta.target() == CHANGE_TARGET && *meta.level() <= level
        }));
    let diagnostics = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .without_time()
        .with_filter(filter_fn(move |meta| {
            meta.target() != CHANGE_TARGET && *meta.level() <= level
        }));
    tracing_subscriber::registry().with(changes).with(diagnostics)
}
