//! The standard task set.
//!
//! | task     | runs first              | then                            |
//! |----------|-------------------------|---------------------------------|
//! | `hugo`   |                         | development site build          |
//! | `sass`   |                         | stylesheets                     |
//! | `js`     |                         | script bundle                   |
//! | `fonts`  |                         | font flattening                 |
//! | `server` | hugo, sass, js, fonts   | preview server with watchers    |
//! | `build`  | sass, js, fonts         | production site build           |

use crate::blueprint::{Blueprint, Pipeline};
use crate::error::PipelineError;
use crate::steps;

/// Register the standard tasks and validate the resulting graph.
pub fn standard() -> Result<Pipeline, PipelineError> {
    let mut blueprint = Blueprint::new();

    let hugo = blueprint.task("hugo").run(steps::hugo::task)?;
    let sass = blueprint.task("sass").run(steps::styles::task)?;
    let js = blueprint.task("js").run(steps::scripts::task)?;
    let fonts = blueprint.task("fonts").run(steps::fonts::task)?;

    #[cfg(feature = "server")]
    blueprint
        .task("server")
        .depends_on([hugo, sass, js, fonts])
        .run(move |ctx| async move {
            use crate::server::WatchBinding;

            let watch = &ctx.env.config.watch;
            let bindings = vec![
                WatchBinding::new(&watch.js, [js]),
                WatchBinding::new(&watch.scss, [sass]),
                WatchBinding::new(&watch.fonts, [fonts]),
                WatchBinding::new(&watch.site, [hugo]),
            ];

            crate::server::serve(ctx, bindings).await?;
            anyhow::Ok(())
        })?;

    blueprint
        .task("build")
        .depends_on([sass, js, fonts])
        .run(steps::hugo::task_production)?;

    blueprint.finish()
}
