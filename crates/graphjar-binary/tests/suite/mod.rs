
mod decode_proptest;
mod external_references;
mod indexes;
mod loading;
mod round_trip;
