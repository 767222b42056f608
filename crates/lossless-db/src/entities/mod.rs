pub mod playlist;
pub mod playlist_song;
pub mod song;
pub mod user;
