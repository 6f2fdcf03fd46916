// Pure stage logic: no IO, no async. Pipelines in `app` wire these to storage and HTTP.

pub mod ad_parser;
pub mod city_matcher;
pub mod cleaning;
pub mod features;
pub mod html_text;
pub mod metrics;
pub mod price_model;
pub mod regression;
pub mod results_page;
