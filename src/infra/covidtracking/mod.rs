mod client;

pub use client::CovidTrackingApi;
