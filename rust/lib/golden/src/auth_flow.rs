//! Session golden tests: login, refresh coordination and forced logout
//! against a live backend.
