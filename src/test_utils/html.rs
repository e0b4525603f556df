//! Page builders mirroring the markup the scrapers read.

fn pager(has_next: bool) -> String {
    if has_next {
        r#"<nav class="pagination"><a class="pagination-next" href="?page=next">Далее</a></nav>"#.to_string()
    } else {
        r#"<nav class="pagination"><a class="pagination-next disabled">Далее</a></nav>"#.to_string()
    }
}

fn document(body: &str) -> String {
    format!("<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body>{body}</body></html>")
}

// ====== Players ======

#[derive(Debug, Clone)]
pub struct PlayerRow {
    id: String,
    name: String,
    region: String,
    club_id: Option<String>,
    elo: String,
}

impl PlayerRow {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            region: "Москва".into(),
            club_id: None,
            elo: "—".into(),
        }
    }

    pub fn club(mut self, club_id: &str) -> Self {
        self.club_id = Some(club_id.into());
        self
    }

    pub fn elo(mut self, elo: &str) -> Self {
        self.elo = elo.into();
        self
    }

    fn render(&self) -> String {
        let club = match &self.club_id {
            Some(id) => format!(r#"<a href="/club/{id}">Club {id}</a>"#),
            None => "—".to_string(),
        };
        format!(
            r#"<tr class="rating-row" data-player-id="{id}">
                <td class="col-name"><a href="/stats/{id}">{name}</a></td>
                <td class="col-region">{region}</td>
                <td class="col-club">{club}</td>
                <td class="col-elo">{elo}</td>
                <td class="col-tournaments">12</td>
                <td class="col-gg">45,5</td>
            </tr>"#,
            id = self.id,
            name = self.name,
            region = self.region,
            elo = self.elo,
        )
    }
}

pub fn players_page(rows: &[PlayerRow], has_next: bool) -> String {
    let rows: String = rows.iter().map(PlayerRow::render).collect();
    document(&format!(
        r#"<table class="rating-table"><tbody>{rows}</tbody></table>{}"#,
        pager(has_next)
    ))
}

// ====== Clubs ======

pub fn clubs_page(clubs: &[(&str, &str)], has_next: bool) -> String {
    let rows: String = clubs
        .iter()
        .map(|(id, name)| {
            format!(
                r#"<tr class="club-row">
                    <td class="col-name"><a href="/club/{id}">{name}</a></td>
                    <td class="col-region">Москва</td>
                    <td class="col-president">Иван Петров</td>
                    <td class="col-members">20</td>
                    <td class="col-elo">1 580</td>
                </tr>"#
            )
        })
        .collect();
    document(&format!(
        r#"<table class="clubs-table"><tbody>{rows}</tbody></table>{}"#,
        pager(has_next)
    ))
}

// ====== Tournaments ======

#[derive(Debug, Clone)]
pub struct TournamentRow {
    id: String,
    name: String,
    status: String,
    stars: String,
    prize: String,
}

impl TournamentRow {
    pub fn new(id: &str, name: &str, status_label: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: status_label.into(),
            stars: "★★★☆☆".into(),
            prize: "10 000 ₽".into(),
        }
    }

    pub fn stars(mut self, stars: &str) -> Self {
        self.stars = stars.into();
        self
    }

    pub fn prize(mut self, prize: &str) -> Self {
        self.prize = prize.into();
        self
    }

    fn render(&self) -> String {
        format!(
            r#"<tr class="tournament-row">
                <td class="col-name"><a href="/tournament/{id}">{name}</a></td>
                <td class="col-badges"><span class="badge-fsm">ФСМ</span></td>
                <td class="col-city">Москва</td>
                <td class="col-status">{status}</td>
                <td class="col-dates">01.03.2024 – 03.03.2024</td>
                <td class="col-stars">{stars}</td>
                <td class="col-elo">1 550,0</td>
                <td class="col-prize">{prize}</td>
                <td class="col-participants">40</td>
            </tr>"#,
            id = self.id,
            name = self.name,
            status = self.status,
            stars = self.stars,
            prize = self.prize,
        )
    }
}

pub fn tournaments_page(rows: &[TournamentRow], has_next: bool) -> String {
    let rows: String = rows.iter().map(TournamentRow::render).collect();
    document(&format!(
        r#"<table class="tournaments-table"><tbody>{rows}</tbody></table>{}"#,
        pager(has_next)
    ))
}

// ====== Games ======

const SEAT_ROLES: [&str; 10] = [
    "Мирный", "Мирный", "Мирный", "Мирный", "Мирный", "Мирный", "Шериф", "Мафия", "Мафия", "Дон",
];

/// One played table with players "1".."10".
#[derive(Debug, Clone)]
pub struct GameCard {
    round: i64,
    table: i64,
    result: String,
    positioned: bool,
}

impl GameCard {
    pub fn new(round: i64, table: i64, result_label: &str) -> Self {
        Self {
            round,
            table,
            result: result_label.into(),
            positioned: true,
        }
    }

    /// Drops `data-round`/`data-table` from the card.
    pub fn without_position(mut self) -> Self {
        self.positioned = false;
        self
    }

    fn render(&self) -> String {
        let position = if self.positioned {
            format!(r#" data-round="{}" data-table="{}""#, self.round, self.table)
        } else {
            String::new()
        };
        let seats: String = SEAT_ROLES
            .iter()
            .enumerate()
            .map(|(i, role)| {
                let player = i + 1;
                format!(
                    r#"<tr class="seat">
                        <td class="seat-player"><a href="/stats/{player}">Player {player}</a></td>
                        <td class="seat-role">{role}</td>
                        <td class="seat-points">{points}</td>
                    </tr>"#,
                    points = format!("{},{}", 1 + i / 5, i % 10),
                )
            })
            .collect();

        format!(
            r#"<div class="game-card"{position}>
                <span class="game-date">01.03.2024</span>
                <span class="game-result">{result}</span>
                <table class="seats"><tbody>{seats}</tbody></table>
            </div>"#,
            result = self.result,
        )
    }
}

pub fn games_page(cards: &[GameCard], has_next: bool) -> String {
    let cards: String = cards.iter().map(GameCard::render).collect();
    document(&format!(r#"<div class="games-list">{cards}</div>{}"#, pager(has_next)))
}

// ====== Results ======

#[derive(Debug, Clone)]
pub struct ResultRow {
    place: i64,
    player_id: String,
    prize: String,
    elo_delta: String,
}

impl ResultRow {
    pub fn new(place: i64, player_id: &str) -> Self {
        Self {
            place,
            player_id: player_id.into(),
            prize: "—".into(),
            elo_delta: "0".into(),
        }
    }

    pub fn prize(mut self, prize: &str) -> Self {
        self.prize = prize.into();
        self
    }

    pub fn elo_delta(mut self, delta: &str) -> Self {
        self.elo_delta = delta.into();
        self
    }

    fn render(&self) -> String {
        format!(
            r#"<tr class="result-row">
                <td class="col-place">{place}</td>
                <td class="col-player"><a href="/stats/{id}">Player {id}</a></td>
                <td class="col-gg">4,5</td>
                <td class="col-elo-delta">{delta}</td>
                <td class="col-prize">{prize}</td>
            </tr>"#,
            place = self.place,
            id = self.player_id,
            delta = self.elo_delta,
            prize = self.prize,
        )
    }
}

/// Standings fit on one page.
pub fn results_page(rows: &[ResultRow]) -> String {
    let rows: String = rows.iter().map(ResultRow::render).collect();
    document(&format!(
        r#"<table class="results-table"><tbody>{rows}</tbody></table>{}"#,
        pager(false)
    ))
}

// ====== Year stats ======

#[derive(Debug, Clone, Copy)]
pub struct YearStats {
    total: i64,
}

impl YearStats {
    /// Role split: a tenth don, a tenth sheriff, a fifth mafia, the rest civilian.
    pub fn new(total: i64) -> Self {
        Self { total }
    }
}

pub fn year_stats_page(stats: Option<YearStats>) -> String {
    let Some(YearStats { total }) = stats else {
        return document(r#"<div class="year-stats-empty">Нет игр за этот год</div>"#);
    };
    let don = total / 10;
    let sheriff = total / 10;
    let mafia = total / 5;
    let civilian = total - don - sheriff - mafia;

    document(&format!(
        r#"<div class="year-stats">
            <div>Игр: <span class="stat-total-games">{total}</span></div>
            <div>Дон: <span class="stat-don-games">{don}</span></div>
            <div>Мафия: <span class="stat-mafia-games">{mafia}</span></div>
            <div>Шериф: <span class="stat-sheriff-games">{sheriff}</span></div>
            <div>Мирный: <span class="stat-civilian-games">{civilian}</span></div>
            <div>ELO: <span class="stat-elo">1 520,5</span></div>
            <div>Доп. баллы: <span class="stat-extra-points">3,25</span></div>
        </div>"#
    ))
}
