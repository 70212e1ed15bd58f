pub mod covidtracking;
