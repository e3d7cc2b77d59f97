//! The library code for the `kiln` static blog generator. A build is a
//! straight pipeline ([`crate::build::build_site`]):
//!
//! 1. Parsing posts from the contents directory ([`crate::parser`])
//! 2. Rendering standalone pages and post pages ([`crate::write`])
//! 3. Copying assets and post bundle files into the output directory
//!
//! Each post body is itself a pipeline: the front matter is split off, fenced
//! code blocks are rewritten into highlighted HTML ([`crate::highlight`]), and
//! the result is converted from markdown to HTML ([`crate::markdown`]) before
//! being merged into the post template.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod highlight;
pub mod markdown;
pub mod parser;
pub mod post;
pub mod value;
pub mod write;
