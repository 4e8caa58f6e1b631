//! Development diagnostics
//!
//! Warns about a second api claiming the same reducer path and about tags
//! whose type was never declared.

use super::{CacheHandler, HandlerContext};
use crate::actions::ApiAction;
use crate::state::MiddlewareRegistration;
use crate::tags::Tag;

pub(crate) struct DevCheck;

impl DevCheck {
    fn check_tag_types(tags: &[Tag], endpoint: Option<&str>, cx: &HandlerContext<'_>) {
        let declared = &cx.shared.config.tag_types;
        if declared.is_empty() {
            return;
        }
        for tag in tags {
            if declared.iter().any(|tag_type| *tag_type == tag.tag_type) {
                continue;
            }
            tracing::warn!(
                api = cx.shared.path(),
                endpoint = endpoint.unwrap_or("-"),
                "Tag type \"{}\" is not declared in the tag_types of api \"{}\"",
                tag.tag_type,
                cx.shared.path()
            );
        }
    }
}

impl CacheHandler for DevCheck {
    fn handle(&self, action: &ApiAction<'_>, cx: &mut HandlerContext<'_>) {
        match action {
            ApiAction::MiddlewareRegistered(api_uid) => {
                let conflict = cx.after().is_some_and(|slice| {
                    slice.config.middleware_registered == MiddlewareRegistration::Conflict
                });
                if *api_uid == cx.shared.api_uid && conflict {
                    let path = cx.shared.path();
                    let hint = if path == "api" {
                        " If you have multiple apis, you *have* to specify the reducer_path option when creating an api!"
                    } else {
                        ""
                    };
                    tracing::warn!(
                        api = path,
                        "There is a mismatch between slice and middleware for the reducer path \"{path}\". \
                         You can only have one api per reducer path, this will lead to crashes in various situations!{hint}"
                    );
                }
            },
            ApiAction::Fulfilled(fulfilled) => {
                Self::check_tag_types(&fulfilled.tags, Some(fulfilled.arg.endpoint_name.as_str()), cx);
            },
            ApiAction::Rejected(rejected) => {
                Self::check_tag_types(&rejected.tags, Some(rejected.arg.endpoint_name.as_str()), cx);
            },
            ApiAction::InvalidateTags(tags) => Self::check_tag_types(tags, None, cx),
            _ => {},
        }
    }
}
