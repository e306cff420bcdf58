//! Built-in fallback questions, seeded into `question_pool` at start-up.

use rand::{Rng, seq::SliceRandom};

use crate::dao::models::{Difficulty, PoolQuestionEntity, Testament};

use super::corpus::book_of_reference;

type Seed = (
    Difficulty,
    &'static str,
    &'static str,
    [&'static str; 3],
    &'static str,
);

const SEED: &[Seed] = &[
    (Difficulty::Easy, "Who built the ark to survive the flood?", "Noah", ["Moses", "Abraham", "David"], "Genesis 6:14"),
    (Difficulty::Easy, "What did God create on the first day?", "Light", ["Animals", "Plants", "The stars"], "Genesis 1:3"),
    (Difficulty::Easy, "Who was swallowed by a great fish?", "Jonah", ["Peter", "Elijah", "Samuel"], "Jonah 1:17"),
    (Difficulty::Easy, "In which town was Jesus born?", "Bethlehem", ["Nazareth", "Jerusalem", "Capernaum"], "Matthew 2:1"),
    (Difficulty::Easy, "Who defeated Goliath with a sling and a stone?", "David", ["Saul", "Samson", "Jonathan"], "1 Samuel 17:50"),
    (Difficulty::Easy, "How many disciples did Jesus appoint?", "Twelve", ["Seven", "Ten", "Forty"], "Mark 3:14"),
    (Difficulty::Easy, "Who led the Israelites out of Egypt?", "Moses", ["Joshua", "Aaron", "Joseph"], "Exodus 3:10"),
    (Difficulty::Easy, "What was the name of the first man?", "Adam", ["Abel", "Seth", "Noah"], "Genesis 2:20"),
    (Difficulty::Easy, "Who denied Jesus three times?", "Peter", ["John", "Judas", "Thomas"], "Luke 22:61"),
    (Difficulty::Easy, "What did Jesus turn water into at the wedding in Cana?", "Wine", ["Milk", "Oil", "Honey"], "John 2:9"),
    (Difficulty::Easy, "Who was the mother of Jesus?", "Mary", ["Martha", "Elizabeth", "Anna"], "Luke 1:30"),
    (Difficulty::Easy, "Who betrayed Jesus for thirty pieces of silver?", "Judas", ["Peter", "Thomas", "Andrew"], "Matthew 26:15"),
    (Difficulty::Easy, "What was the name of the first woman?", "Eve", ["Sarah", "Mary", "Leah"], "Genesis 3:20"),
    (Difficulty::Easy, "Which son of Adam killed his brother Abel?", "Cain", ["Seth", "Enoch", "Lamech"], "Genesis 4:8"),
    (Difficulty::Easy, "Whose great strength was tied to his uncut hair?", "Samson", ["Gideon", "Saul", "Goliath"], "Judges 16:17"),
    (Difficulty::Easy, "What did God give Moses on two tablets of stone?", "The Ten Commandments", ["A golden calf", "A shepherd's staff", "A royal crown"], "Exodus 31:18"),
    (Difficulty::Easy, "On which day did God rest from the work of creation?", "The seventh day", ["The first day", "The third day", "The sixth day"], "Genesis 2:2"),
    (Difficulty::Easy, "Who baptized Jesus in the Jordan River?", "John the Baptist", ["Peter", "Andrew", "Elijah"], "Matthew 3:13"),
    (Difficulty::Easy, "What did the dove carry back to Noah's ark?", "An olive leaf", ["A fig", "A stone", "A feather"], "Genesis 8:11"),
    (Difficulty::Easy, "For how many days was Jesus tempted in the wilderness?", "Forty", ["Seven", "Three", "Twelve"], "Luke 4:2"),
    (Difficulty::Easy, "Which sea did Moses part with his outstretched hand?", "The Red Sea", ["The Dead Sea", "The Sea of Galilee", "The Great Sea"], "Exodus 14:21"),
    (Difficulty::Easy, "Who was the wife of Abraham?", "Sarah", ["Rebekah", "Rachel", "Hagar"], "Genesis 17:15"),
    (Difficulty::Easy, "Which disciple doubted until he touched the wounds of Jesus?", "Thomas", ["Philip", "James", "Matthew"], "John 20:27"),
    (Difficulty::Easy, "How many loaves did Jesus use to feed the five thousand?", "Five", ["Two", "Seven", "Twelve"], "Mark 6:41"),
    (Difficulty::Easy, "Which son of David asked God for wisdom?", "Solomon", ["Rehoboam", "Absalom", "Amnon"], "1 Kings 3:12"),
    (Difficulty::Easy, "What was the first plague sent upon Egypt?", "Water turned to blood", ["Frogs", "Locusts", "Darkness"], "Exodus 7:20"),
    (Difficulty::Easy, "What is the first book of the Bible?", "Genesis", ["Exodus", "Matthew", "Psalms"], "Genesis 1:1"),
    (Difficulty::Easy, "Which prophet anointed young David as king?", "Samuel", ["Nathan", "Elijah", "Isaiah"], "1 Samuel 16:13"),
    (Difficulty::Easy, "Whose walls fell after the Israelites marched around them for seven days?", "Jericho", ["Ai", "Babylon", "Nineveh"], "Joshua 6:20"),
    (Difficulty::Easy, "What animal did Jesus ride into Jerusalem?", "A donkey", ["A horse", "A camel", "An ox"], "John 12:14"),
    (Difficulty::Medium, "Who was thrown into the den of lions?", "Daniel", ["Shadrach", "Jeremiah", "Ezekiel"], "Daniel 6:16"),
    (Difficulty::Medium, "By what name was Saul of Tarsus also called?", "Paul", ["Silas", "Barnabas", "Stephen"], "Acts 13:9"),
    (Difficulty::Medium, "Who was sold into slavery by his brothers?", "Joseph", ["Benjamin", "Reuben", "Isaac"], "Genesis 37:28"),
    (Difficulty::Medium, "Who told her mother-in-law that wherever she went, she would go?", "Ruth", ["Naomi", "Esther", "Orpah"], "Ruth 1:16"),
    (Difficulty::Medium, "Who was stoned while praying for his persecutors?", "Stephen", ["James", "Philip", "Peter"], "Acts 7:59"),
    (Difficulty::Medium, "For how many days and nights did it rain during the flood?", "Forty", ["Seven", "Twelve", "One hundred"], "Genesis 7:12"),
    (Difficulty::Medium, "Which tax collector climbed a sycamore tree to see Jesus?", "Zacchaeus", ["Matthew", "Nicodemus", "Simon"], "Luke 19:4"),
    (Difficulty::Medium, "Who was the mother of Samuel?", "Hannah", ["Sarah", "Rachel", "Elizabeth"], "1 Samuel 1:20"),
    (Difficulty::Medium, "Who was the twin brother of Jacob?", "Esau", ["Laban", "Reuben", "Ishmael"], "Genesis 25:25"),
    (Difficulty::Medium, "Which queen risked her life to save the Jews in Persia?", "Esther", ["Vashti", "Jezebel", "Athaliah"], "Esther 4:16"),
    (Difficulty::Medium, "What bread from heaven fed Israel in the wilderness?", "Manna", ["Figs", "Barley", "Dates"], "Exodus 16:15"),
    (Difficulty::Medium, "Who was the father of Isaac?", "Abraham", ["Terah", "Lot", "Jacob"], "Genesis 21:3"),
    (Difficulty::Medium, "Which disciple stepped out of the boat to walk on water?", "Peter", ["John", "Andrew", "Thomas"], "Matthew 14:29"),
    (Difficulty::Medium, "Who poured oil on Saul to make him king?", "Samuel", ["Nathan", "Eli", "Gad"], "1 Samuel 10:1"),
    (Difficulty::Medium, "Which prophet was fed by ravens at the brook Cherith?", "Elijah", ["Elisha", "Amos", "Micah"], "1 Kings 17:6"),
    (Difficulty::Medium, "What was Matthew's occupation before he followed Jesus?", "Tax collector", ["Fisherman", "Tentmaker", "Carpenter"], "Matthew 9:9"),
    (Difficulty::Medium, "Who was raised from the dead after four days in the tomb?", "Lazarus", ["Jairus", "Eutychus", "Bartimaeus"], "John 11:39"),
    (Difficulty::Medium, "In which garden did Jesus pray on the night of his arrest?", "Gethsemane", ["Eden", "Golgotha", "Bethany"], "Mark 14:32"),
    (Difficulty::Medium, "Who was made the first king over Israel at Gilgal?", "Saul", ["David", "Solomon", "Ishbosheth"], "1 Samuel 11:15"),
    (Difficulty::Medium, "In which river was Naaman told to wash seven times?", "Jordan", ["Euphrates", "Nile", "Jabbok"], "2 Kings 5:10"),
    (Difficulty::Medium, "Who laughed when told she would bear a son in her old age?", "Sarah", ["Rebekah", "Hannah", "Leah"], "Genesis 18:12"),
    (Difficulty::Medium, "Which apostle was chosen by lot to replace Judas?", "Matthias", ["Barnabas", "Silas", "Timothy"], "Acts 1:26"),
    (Difficulty::Medium, "Whose wife became a pillar of salt?", "Lot", ["Abraham", "Noah", "Laban"], "Genesis 19:26"),
    (Difficulty::Medium, "Who interpreted Pharaoh's dreams of cows and grain?", "Joseph", ["Daniel", "Moses", "Aaron"], "Genesis 41:25"),
    (Difficulty::Medium, "To which city was Jonah sent to preach?", "Nineveh", ["Babylon", "Tyre", "Damascus"], "Jonah 3:4"),
    (Difficulty::Medium, "Who was compelled to carry the cross of Jesus?", "Simon of Cyrene", ["Joseph of Arimathea", "Nicodemus", "Barabbas"], "Mark 15:21"),
    (Difficulty::Medium, "Which prisoner did Pilate release instead of Jesus?", "Barabbas", ["Simon", "Malchus", "Lazarus"], "Matthew 27:26"),
    (Difficulty::Medium, "What was the name of Moses' brother?", "Aaron", ["Hur", "Joshua", "Caleb"], "Exodus 4:14"),
    (Difficulty::Medium, "Which prophetess judged Israel alongside Barak?", "Deborah", ["Jael", "Miriam", "Huldah"], "Judges 4:4"),
    (Difficulty::Medium, "Who was Timothy's grandmother?", "Lois", ["Eunice", "Lydia", "Priscilla"], "2 Timothy 1:5"),
    (Difficulty::Hard, "Who was the father of John the Baptist?", "Zacharias", ["Joseph", "Simeon", "Eli"], "Luke 1:13"),
    (Difficulty::Hard, "On which mountain did Elijah confront the prophets of Baal?", "Carmel", ["Sinai", "Horeb", "Zion"], "1 Kings 18:19"),
    (Difficulty::Hard, "Which king saw a hand writing on the palace wall?", "Belshazzar", ["Nebuchadnezzar", "Darius", "Cyrus"], "Daniel 5:5"),
    (Difficulty::Hard, "Before which high priest was Jesus taken after his arrest?", "Caiaphas", ["Gamaliel", "Eli", "Zadok"], "Matthew 26:57"),
    (Difficulty::Hard, "Which nephew of Abraham lived in Sodom?", "Lot", ["Laban", "Nahor", "Terah"], "Genesis 14:12"),
    (Difficulty::Hard, "Who succeeded Moses as leader of Israel?", "Joshua", ["Caleb", "Aaron", "Gideon"], "Joshua 1:2"),
    (Difficulty::Hard, "In which city were the disciples first called Christians?", "Antioch", ["Jerusalem", "Rome", "Ephesus"], "Acts 11:26"),
    (Difficulty::Hard, "Which prophet went up to heaven in a whirlwind?", "Elijah", ["Elisha", "Enoch", "Isaiah"], "2 Kings 2:11"),
    (Difficulty::Hard, "Which seller of purple cloth was baptized at Philippi?", "Lydia", ["Priscilla", "Dorcas", "Phoebe"], "Acts 16:14"),
    (Difficulty::Hard, "Which priest raised the boy Samuel at Shiloh?", "Eli", ["Zadok", "Abiathar", "Phinehas"], "1 Samuel 3:1"),
    (Difficulty::Hard, "Which tribe received no land inheritance because the Lord was its portion?", "Levi", ["Judah", "Dan", "Benjamin"], "Numbers 18:20"),
    (Difficulty::Hard, "Which runaway slave did Paul send back to Philemon?", "Onesimus", ["Tychicus", "Epaphras", "Demas"], "Philemon 1:10"),
    (Difficulty::Hard, "Which king threw Shadrach, Meshach and Abednego into the furnace?", "Nebuchadnezzar", ["Darius", "Belshazzar", "Cyrus"], "Daniel 3:20"),
    (Difficulty::Hard, "Who was the father of Abram?", "Terah", ["Nahor", "Haran", "Lot"], "Genesis 11:27"),
    (Difficulty::Hard, "Which Persian king decreed that the temple in Jerusalem be rebuilt?", "Cyrus", ["Xerxes", "Darius", "Artaxerxes"], "Ezra 1:2"),
    (Difficulty::Hard, "Who led the rebuilding of Jerusalem's walls after the exile?", "Nehemiah", ["Ezra", "Zerubbabel", "Haggai"], "Nehemiah 2:17"),
    (Difficulty::Hard, "Which judge asked for a sign with a fleece?", "Gideon", ["Samson", "Jephthah", "Ehud"], "Judges 6:37"),
    (Difficulty::Hard, "Who became the wife of Isaac?", "Rebekah", ["Rachel", "Leah", "Keturah"], "Genesis 24:67"),
    (Difficulty::Hard, "Which prophet was told to marry Gomer?", "Hosea", ["Amos", "Joel", "Micah"], "Hosea 1:3"),
    (Difficulty::Hard, "In which city was Paul born?", "Tarsus", ["Antioch", "Damascus", "Corinth"], "Acts 22:3"),
    (Difficulty::Hard, "Which Pharisee came to Jesus by night?", "Nicodemus", ["Gamaliel", "Simon", "Joseph"], "John 3:2"),
    (Difficulty::Hard, "Who lived longer than anyone else recorded in Scripture?", "Methuselah", ["Enoch", "Noah", "Adam"], "Genesis 5:27"),
    (Difficulty::Hard, "Which woman hid the Israelite spies on her roof in Jericho?", "Rahab", ["Deborah", "Jael", "Tamar"], "Joshua 2:4"),
    (Difficulty::Hard, "Which son of Saul loved David as his own soul?", "Jonathan", ["Abner", "Ishbosheth", "Mephibosheth"], "1 Samuel 18:1"),
    (Difficulty::Hard, "Which disciple at Joppa did Peter raise from the dead?", "Tabitha", ["Lydia", "Rhoda", "Priscilla"], "Acts 9:40"),
    (Difficulty::Hard, "Who was the mother of Solomon?", "Bathsheba", ["Abigail", "Michal", "Tamar"], "1 Kings 1:11"),
    (Difficulty::Hard, "Which prophet saw a valley full of dry bones?", "Ezekiel", ["Jeremiah", "Isaiah", "Zechariah"], "Ezekiel 37:1"),
    (Difficulty::Hard, "Which wife did Jacob love more than Leah?", "Rachel", ["Zilpah", "Bilhah", "Dinah"], "Genesis 29:30"),
    (Difficulty::Hard, "On which island did John receive his revelation?", "Patmos", ["Crete", "Malta", "Cyprus"], "Revelation 1:9"),
    (Difficulty::Hard, "On which island was Paul shipwrecked on the way to Rome?", "Malta", ["Crete", "Cyprus", "Rhodes"], "Acts 28:1"),
    (Difficulty::Expert, "Which left-handed judge killed King Eglon of Moab?", "Ehud", ["Othniel", "Shamgar", "Jephthah"], "Judges 3:21"),
    (Difficulty::Expert, "Which sorcerer on Cyprus was struck blind when Paul rebuked him?", "Elymas", ["Simon", "Sceva", "Demetrius"], "Acts 13:8"),
    (Difficulty::Expert, "Which king of Judah was struck with leprosy for burning incense in the temple?", "Uzziah", ["Hezekiah", "Josiah", "Jehoshaphat"], "2 Chronicles 26:19"),
    (Difficulty::Expert, "Who was the father of Methuselah?", "Enoch", ["Lamech", "Jared", "Seth"], "Genesis 5:21"),
    (Difficulty::Expert, "Which church is rebuked for being lukewarm?", "Laodicea", ["Sardis", "Philadelphia", "Smyrna"], "Revelation 3:16"),
    (Difficulty::Expert, "Which young man fell from a window while Paul preached late into the night?", "Eutychus", ["Tychicus", "Trophimus", "Aristarchus"], "Acts 20:9"),
    (Difficulty::Expert, "What was the name of the servant whose ear Peter cut off?", "Malchus", ["Barabbas", "Rhoda", "Cornelius"], "John 18:10"),
    (Difficulty::Expert, "Which prophet was the son of Amoz?", "Isaiah", ["Jeremiah", "Ezekiel", "Hosea"], "Isaiah 1:1"),
    (Difficulty::Expert, "Who was the father of Gideon?", "Joash", ["Jether", "Abimelech", "Zerah"], "Judges 6:11"),
    (Difficulty::Expert, "Which king of Israel took Jezebel as his wife?", "Ahab", ["Omri", "Jehu", "Jeroboam"], "1 Kings 16:31"),
    (Difficulty::Expert, "Who commanded David's army?", "Joab", ["Abner", "Amasa", "Benaiah"], "2 Samuel 8:16"),
    (Difficulty::Expert, "Which prophet told David, you are the man?", "Nathan", ["Gad", "Samuel", "Ahijah"], "2 Samuel 12:7"),
    (Difficulty::Expert, "What Babylonian name was given to Daniel?", "Belteshazzar", ["Abednego", "Meshach", "Shadrach"], "Daniel 1:7"),
    (Difficulty::Expert, "During whose reign was the Book of the Law found in the temple?", "Josiah", ["Hezekiah", "Manasseh", "Asa"], "2 Kings 22:8"),
    (Difficulty::Expert, "Which daughter of Reuel became the wife of Moses?", "Zipporah", ["Miriam", "Jochebed", "Elisheba"], "Exodus 2:21"),
    (Difficulty::Expert, "Which centurion of the Italian band was baptized after Peter's visit?", "Cornelius", ["Julius", "Claudius", "Longinus"], "Acts 10:48"),
    (Difficulty::Expert, "Who was the mother of Moses?", "Jochebed", ["Zipporah", "Miriam", "Puah"], "Exodus 6:20"),
    (Difficulty::Expert, "Which king of Salem brought out bread and wine to Abram?", "Melchizedek", ["Abimelech", "Chedorlaomer", "Bera"], "Genesis 14:18"),
    (Difficulty::Expert, "Who was the father of Jesse?", "Obed", ["Boaz", "Salmon", "Nahshon"], "Ruth 4:17"),
    (Difficulty::Expert, "Which girl answered the door when Peter came from prison?", "Rhoda", ["Dorcas", "Lydia", "Priscilla"], "Acts 12:13"),
    (Difficulty::Expert, "Who was made the first king of the northern tribes after the split?", "Jeroboam", ["Rehoboam", "Omri", "Baasha"], "1 Kings 12:20"),
    (Difficulty::Expert, "Which prophet was among the herdsmen of Tekoa?", "Amos", ["Micah", "Joel", "Obadiah"], "Amos 1:1"),
    (Difficulty::Expert, "Whom did Ruth marry in Bethlehem?", "Boaz", ["Mahlon", "Chilion", "Elimelech"], "Ruth 4:13"),
    (Difficulty::Expert, "Which Agagite plotted to destroy all the Jews in Persia?", "Haman", ["Mordecai", "Hegai", "Bigthan"], "Esther 3:6"),
    (Difficulty::Expert, "Who was the father of Samson?", "Manoah", ["Elkanah", "Jair", "Tola"], "Judges 13:24"),
    (Difficulty::Expert, "Who was the husband of Priscilla?", "Aquila", ["Apollos", "Silas", "Titus"], "Acts 18:2"),
    (Difficulty::Expert, "Who baptized the Ethiopian eunuch?", "Philip", ["Peter", "Stephen", "Paul"], "Acts 8:38"),
    (Difficulty::Expert, "To whom was Jesus first led after his arrest in the garden?", "Annas", ["Caiaphas", "Gamaliel", "Ananias"], "John 18:13"),
    (Difficulty::Expert, "Which king of Tyre supplied cedar for Solomon's temple?", "Hiram", ["Toi", "Rezin", "Hadad"], "1 Kings 5:10"),
    (Difficulty::Expert, "Who was the husband of Sapphira?", "Ananias", ["Barnabas", "Joses", "Simon"], "Acts 5:1"),
];

/// The built-in pool as storable rows.
pub fn builtin_pool() -> Vec<PoolQuestionEntity> {
    SEED.iter()
        .map(|(difficulty, question, answer, incorrect, reference)| {
            let (book, testament) = book_of_reference(reference)
                .map(|book| (book.name.to_owned(), book.testament))
                .unwrap_or_else(|| ((*reference).to_owned(), Testament::Old));
            PoolQuestionEntity {
                question_text: (*question).to_owned(),
                correct_answer: (*answer).to_owned(),
                incorrect_answers: incorrect.iter().map(|s| (*s).to_owned()).collect(),
                source_reference: (*reference).to_owned(),
                book,
                testament,
                difficulty: *difficulty,
            }
        })
        .collect()
}

/// Pool rows in random draw order.
pub fn draw_order(mut pool: Vec<PoolQuestionEntity>, rng: &mut impl Rng) -> Vec<PoolQuestionEntity> {
    pool.shuffle(rng);
    pool
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_seed_reference_names_a_known_book() {
        for (_, _, _, _, reference) in SEED {
            assert!(
                book_of_reference(reference).is_some(),
                "unknown book in {reference}"
            );
        }
    }

    #[test]
    fn each_difficulty_can_fill_the_largest_game_alone() {
        let pool = builtin_pool();
        for difficulty in Difficulty::ALL {
            let references: HashSet<_> = pool
                .iter()
                .filter(|q| q.difficulty == difficulty)
                .map(|q| q.source_reference.as_str())
                .collect();
            assert!(references.len() >= 30, "{difficulty} has {}", references.len());
        }
    }
}
